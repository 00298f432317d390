use actix_web::{HttpResponse, web};
use chrono::NaiveTime;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::shift::Shift,
    store::directory,
};

/// Grace above this is almost certainly a typo in minutes vs seconds.
const MAX_GRACE_MINUTES: u32 = 240;

#[derive(Deserialize, ToSchema)]
pub struct ShiftReq {
    #[schema(example = "Morning")]
    pub name: String,
    #[schema(value_type = String, format = "time", example = "08:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, format = "time", example = "17:00:00")]
    pub end_time: NaiveTime,
    #[schema(example = 5)]
    pub late_grace_minutes: Option<u32>,
}

fn validate(payload: &ShiftReq) -> AppResult<(&str, u32)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    if payload.start_time == payload.end_time {
        return Err(AppError::validation("shift must not start and end at the same time"));
    }
    let grace = payload.late_grace_minutes.unwrap_or(0);
    if grace > MAX_GRACE_MINUTES {
        return Err(AppError::validation(format!(
            "late_grace_minutes must be at most {MAX_GRACE_MINUTES}"
        )));
    }
    Ok((name, grace))
}

#[utoipa::path(
    post,
    path = "/api/shifts",
    request_body = ShiftReq,
    responses(
        (status = 201, description = "Shift created", body = Shift),
        (status = 400, description = "Invalid times or grace")
    ),
    tag = "Directory",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, payload), fields(user_id = auth.user_id))]
pub async fn create_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ShiftReq>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let (name, grace) = validate(&payload)?;

    let result = sqlx::query(
        "INSERT INTO shifts (name, start_time, end_time, late_grace_minutes) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(grace)
    .execute(pool.get_ref())
    .await?;

    let shift = Shift {
        id: result.last_insert_id(),
        name: name.to_string(),
        start_time: payload.start_time,
        end_time: payload.end_time,
        late_grace_minutes: grace,
    };
    info!(shift_id = shift.id, "Shift created");

    Ok(HttpResponse::Created().json(shift))
}

#[utoipa::path(
    get,
    path = "/api/shifts",
    responses((status = 200, description = "All shifts", body = [Shift])),
    tag = "Directory",
    security(("bearer_auth" = []))
)]
pub async fn list_shifts(pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let shifts = sqlx::query_as::<_, Shift>(
        "SELECT id, name, start_time, end_time, late_grace_minutes FROM shifts ORDER BY start_time, id",
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(shifts))
}

#[utoipa::path(
    get,
    path = "/api/shifts/{id}",
    params(("id", Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Shift", body = Shift),
        (status = 404, description = "Shift not found")
    ),
    tag = "Directory",
    security(("bearer_auth" = []))
)]
pub async fn get_shift(pool: web::Data<MySqlPool>, path: web::Path<u64>) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let shift = directory::find_shift(pool.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("shift {id}")))?;

    Ok(HttpResponse::Ok().json(shift))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(start: (u32, u32), end: (u32, u32), grace: Option<u32>) -> ShiftReq {
        ShiftReq {
            name: "Night".into(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            late_grace_minutes: grace,
        }
    }

    #[test]
    fn overnight_shift_is_accepted() {
        assert_eq!(validate(&req((22, 0), (6, 0), Some(10))).unwrap(), ("Night", 10));
    }

    #[test]
    fn zero_length_and_huge_grace_are_rejected() {
        assert!(validate(&req((8, 0), (8, 0), None)).is_err());
        assert!(validate(&req((8, 0), (17, 0), Some(600))).is_err());
    }
}
