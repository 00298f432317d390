use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult, is_unique_violation},
    model::position::Position,
};

#[derive(Deserialize, ToSchema)]
pub struct PositionReq {
    #[schema(example = "Backend Engineer")]
    pub title: String,
}

#[utoipa::path(
    post,
    path = "/api/positions",
    request_body = PositionReq,
    responses(
        (status = 201, description = "Position created", body = Position),
        (status = 409, description = "Title already used")
    ),
    tag = "Directory",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, payload), fields(user_id = auth.user_id))]
pub async fn create_position(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<PositionReq>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }

    let result = sqlx::query("INSERT INTO positions (title) VALUES (?)")
        .bind(title)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Position title already exists".into())
            } else {
                AppError::from(e)
            }
        })?;

    let position = Position {
        id: result.last_insert_id(),
        title: title.to_string(),
    };
    info!(position_id = position.id, "Position created");

    Ok(HttpResponse::Created().json(position))
}

#[utoipa::path(
    get,
    path = "/api/positions",
    responses((status = 200, description = "All positions", body = [Position])),
    tag = "Directory",
    security(("bearer_auth" = []))
)]
pub async fn list_positions(pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let positions = sqlx::query_as::<_, Position>("SELECT id, title FROM positions ORDER BY title")
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(positions))
}
