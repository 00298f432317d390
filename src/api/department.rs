use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult, is_unique_violation},
    model::department::Department,
};

#[derive(Deserialize, ToSchema)]
pub struct DepartmentReq {
    #[schema(example = "Engineering")]
    pub name: String,
}

fn checked_name(payload: &DepartmentReq) -> AppResult<&str> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    Ok(name)
}

fn duplicate(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("Department name already exists".into())
    } else {
        AppError::from(e)
    }
}

#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = DepartmentReq,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 409, description = "Name already used")
    ),
    tag = "Directory",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, payload), fields(user_id = auth.user_id))]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<DepartmentReq>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let name = checked_name(&payload)?;

    let result = sqlx::query("INSERT INTO departments (name) VALUES (?)")
        .bind(name)
        .execute(pool.get_ref())
        .await
        .map_err(duplicate)?;

    let department = Department {
        id: result.last_insert_id(),
        name: name.to_string(),
    };
    info!(department_id = department.id, "Department created");

    Ok(HttpResponse::Created().json(department))
}

#[utoipa::path(
    get,
    path = "/api/departments",
    responses((status = 200, description = "All departments", body = [Department])),
    tag = "Directory",
    security(("bearer_auth" = []))
)]
pub async fn list_departments(pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let departments = sqlx::query_as::<_, Department>("SELECT id, name FROM departments ORDER BY name")
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(departments))
}

#[utoipa::path(
    put,
    path = "/api/departments/{id}",
    params(("id", Path, description = "Department ID")),
    request_body = DepartmentReq,
    responses(
        (status = 200, description = "Department renamed", body = Department),
        (status = 404, description = "Department not found")
    ),
    tag = "Directory",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, payload), fields(user_id = auth.user_id))]
pub async fn update_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<DepartmentReq>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();
    let name = checked_name(&payload)?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM departments WHERE id = ?")
        .bind(id)
        .fetch_one(pool.get_ref())
        .await?;
    if exists == 0 {
        return Err(AppError::not_found(format!("department {id}")));
    }

    sqlx::query("UPDATE departments SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(duplicate)?;

    Ok(HttpResponse::Ok().json(Department {
        id,
        name: name.to_string(),
    }))
}
