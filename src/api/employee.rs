use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult, is_unique_violation},
    model::{employee::Employee, page::PageRequest},
    utils::{
        db_utils::{build_update_sql, execute_update},
        payroll_cache::PayrollCache,
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::{IntoParams, ToSchema};

const UPDATABLE_COLUMNS: &[&str] = &[
    "employee_code",
    "first_name",
    "last_name",
    "email",
    "phone",
    "department_id",
    "position_id",
    "hire_date",
    "status",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john@email.com", format = "email")]
    pub email: String,
    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,
    #[schema(example = 1)]
    pub department_id: u64,
    #[schema(example = 2)]
    pub position_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department_id: Option<u64>,
    pub position_id: Option<u64>,
    pub status: Option<String>,
    /// Matches first name, last name or email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

#[derive(Debug)]
enum Binding {
    U64(u64),
    Str(String),
}

fn employee_filter(query: &EmployeeQuery) -> (String, Vec<Binding>) {
    let mut conditions = Vec::new();
    let mut bindings = Vec::new();

    if let Some(department_id) = query.department_id {
        conditions.push("department_id = ?");
        bindings.push(Binding::U64(department_id));
    }
    if let Some(position_id) = query.position_id {
        conditions.push("position_id = ?");
        bindings.push(Binding::U64(position_id));
    }
    if let Some(status) = &query.status {
        conditions.push("status = ?");
        bindings.push(Binding::Str(status.clone()));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("(first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)");
        let like = format!("%{}%", search);
        bindings.push(Binding::Str(like.clone()));
        bindings.push(Binding::Str(like.clone()));
        bindings.push(Binding::Str(like));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (where_clause, bindings)
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Object, example = json!({ "id": 12 })),
        (status = 400, description = "Blank required field"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Employee code or email already used")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, cache, payload), fields(user_id = auth.user_id))]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PayrollCache>,
    payload: web::Json<CreateEmployee>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    for (field, value) in [
        ("employee_code", &payload.employee_code),
        ("first_name", &payload.first_name),
        ("email", &payload.email),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::validation(format!("{field} must not be empty")));
        }
    }

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_code, first_name, last_name, email, phone, department_id, position_id, hire_date, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'active')
        "#,
    )
    .bind(payload.employee_code.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.email.trim())
    .bind(payload.phone.as_deref())
    .bind(payload.department_id)
    .bind(payload.position_id)
    .bind(payload.hire_date)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Employee code or email already exists".into())
        } else {
            error!(error = %e, "Failed to create employee");
            AppError::from(e)
        }
    })?;

    let id = result.last_insert_id();
    cache.invalidate_all();
    info!(employee_id = id, "Employee created");

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, query), fields(user_id = auth.user_id))]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let page = PageRequest::new(query.page, query.per_page);
    let (where_clause, bindings) = employee_filter(&query);

    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = match b {
            Binding::U64(v) => count_query.bind(*v),
            Binding::Str(v) => count_query.bind(v.as_str()),
        };
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        r#"
        SELECT id, employee_code, first_name, last_name, email, phone,
               department_id, position_id, hire_date, status
        FROM employees {}
        ORDER BY id DESC
        LIMIT ? OFFSET ?
        "#,
        where_clause
    );

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = match b {
            Binding::U64(v) => data_query.bind(*v),
            Binding::Str(v) => data_query.bind(v.as_str()),
        };
    }
    let employees = data_query
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

/// Update Employee
///
/// Accepts any subset of the employee columns as a JSON object.
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Employee updated"),
        (status = 400, description = "Unknown field or empty payload"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, cache, body), fields(user_id = auth.user_id))]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PayrollCache>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    let update = build_update_sql("employees", UPDATABLE_COLUMNS, &body, "id", employee_id)?;

    let affected = execute_update(pool.get_ref(), update).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Employee code or email already exists".into())
        } else {
            AppError::from(e)
        }
    })?;

    if affected == 0 {
        return Err(AppError::not_found(format!("employee {employee_id}")));
    }
    // Names, department and status all feed the payroll roster.
    cache.invalidate_all();

    Ok(HttpResponse::Ok().json(json!({ "message": "Employee updated successfully" })))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Employee still has attendance or contracts")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, cache), fields(user_id = auth.user_id))]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PayrollCache>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| match &e {
            // 1451: row is referenced by a foreign key
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23000") => AppError::Conflict(
                "Employee has attendance or contracts; deactivate instead".into(),
            ),
            _ => AppError::from(e),
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("employee {employee_id}")));
    }
    cache.invalidate_all();

    Ok(HttpResponse::NoContent().finish())
}

/// Get Employee by ID
///
/// Staff may only read their own record.
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Another employee's record"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let employee_id = path.into_inner();
    if auth.is_staff() && auth.employee_id != Some(employee_id) {
        return Err(AppError::Forbidden("Staff can only view their own record".into()));
    }

    let employee = sqlx::query_as::<_, Employee>(
        r#"
        SELECT id, employee_code, first_name, last_name, email, phone,
               department_id, position_id, hire_date, status
        FROM employees
        WHERE id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::not_found(format!("employee {employee_id}")))?;

    Ok(HttpResponse::Ok().json(employee))
}
