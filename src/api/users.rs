use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    auth::{auth::AuthUser, password::hash_password},
    error::{AppError, AppResult, is_unique_violation},
    model::{role::Role, user::User},
    utils::username_index::UsernameIndex,
};

#[derive(Deserialize, ToSchema)]
pub struct CreateUserReq {
    #[schema(example = "jane.doe")]
    pub username: String,
    pub password: String,
    /// 1 = ADMIN, 2 = HR, 3 = STAFF
    #[schema(example = 3)]
    pub role_id: u8,
    pub employee_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct RoleReq {
    #[schema(example = 2)]
    pub role_id: u8,
}

#[derive(Deserialize, ToSchema)]
pub struct ActiveReq {
    pub is_active: bool,
}

fn parse_role(role_id: u8) -> AppResult<Role> {
    Role::from_id(role_id).ok_or_else(|| AppError::validation(format!("unknown role_id {role_id}")))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Blank username/password or unknown role"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Username already taken")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, index, payload), fields(admin_id = auth.user_id, username = %payload.username))]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    index: web::Data<UsernameIndex>,
    payload: web::Json<CreateUserReq>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("Username and password must not be empty"));
    }
    let role = parse_role(payload.role_id)?;

    if !index.is_available(username, pool.get_ref()).await? {
        return Err(AppError::Conflict("Username already taken".into()));
    }

    let hashed = hash_password(&payload.password)?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, password, role_id, employee_id, is_active)
        VALUES (?, ?, ?, ?, 1)
        "#,
    )
    .bind(username)
    .bind(hashed)
    .bind(role.id())
    .bind(payload.employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Username already taken".into())
        } else {
            AppError::from(e)
        }
    })?;

    index.mark_taken(username).await;

    let user = User {
        id: result.last_insert_id(),
        username: username.to_string(),
        role_id: role.id(),
        employee_id: payload.employee_id,
        is_active: true,
    };
    info!(user_id = user.id, role = %role, "User created");

    Ok(HttpResponse::Created().json(user))
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses((status = 200, description = "All users", body = [User])),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn list_users(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let users = sqlx::query_as::<_, User>(
        "SELECT id, username, role_id, employee_id, is_active FROM users ORDER BY id",
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    params(("id", Path, description = "User ID")),
    request_body = RoleReq,
    responses(
        (status = 200, description = "Role changed"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, payload), fields(admin_id = auth.user_id))]
pub async fn change_role(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<RoleReq>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let user_id = path.into_inner();
    let role = parse_role(payload.role_id)?;

    if user_id == auth.user_id && role != Role::Admin {
        return Err(AppError::InvalidState("Admins cannot demote themselves".into()));
    }

    let result = sqlx::query("UPDATE users SET role_id = ? WHERE id = ?")
        .bind(role.id())
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        ensure_user_exists(pool.get_ref(), user_id).await?;
    }

    info!(user_id, role = %role, "Role changed");
    Ok(HttpResponse::Ok().json(serde_json::json!({ "id": user_id, "role": role.to_string() })))
}

/// Deactivating also revokes every outstanding refresh token of the user.
#[utoipa::path(
    put,
    path = "/api/users/{id}/active",
    params(("id", Path, description = "User ID")),
    request_body = ActiveReq,
    responses(
        (status = 200, description = "Activation state changed"),
        (status = 404, description = "User not found")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, payload), fields(admin_id = auth.user_id))]
pub async fn set_active(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ActiveReq>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let user_id = path.into_inner();

    if user_id == auth.user_id && !payload.is_active {
        return Err(AppError::InvalidState("Admins cannot deactivate themselves".into()));
    }

    let mut tx = pool.begin().await?;
    let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(payload.is_active)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if !payload.is_active {
        sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    if result.rows_affected() == 0 {
        ensure_user_exists(pool.get_ref(), user_id).await?;
    }

    if payload.is_active {
        info!(user_id, "User activated");
    } else {
        warn!(user_id, "User deactivated");
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "id": user_id, "is_active": payload.is_active })))
}

// MySQL reports 0 affected rows when the value did not change, so a miss
// needs a second look before it becomes NotFound.
async fn ensure_user_exists(pool: &MySqlPool, user_id: u64) -> AppResult<()> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    if count == 0 {
        return Err(AppError::not_found(format!("user {user_id}")));
    }
    Ok(())
}
