use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult, is_unique_violation},
    model::attendance::AttendanceStatus,
    service::{
        aggregation::{
            EmployeeDayGroup, group_by_employee_and_day, group_by_employee_and_month, month_bounds,
        },
        timekeeping::evaluate_check_in,
    },
    store::{
        attendance::{self as records, RecordFilter},
        directory,
    },
    utils::payroll_cache::PayrollCache,
};

#[derive(Deserialize, ToSchema)]
pub struct ClockReq {
    #[schema(example = 1)]
    pub shift_id: u64,
}

#[derive(Serialize, ToSchema)]
pub struct CheckInResponse {
    pub id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub late_minutes: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct AbsenceSweepReq {
    #[schema(value_type = String, format = "date", example = "2024-03-01")]
    pub date: NaiveDate,
    pub shift_id: u64,
    pub department_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DailyQuery {
    /// Day to report, `YYYY-MM-DD`
    #[param(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub department_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MonthlyQuery {
    pub year: i32,
    pub month: u32,
    pub department_id: Option<u64>,
    pub employee_id: Option<u64>,
}

/// Staff always report on themselves; HR and admins may pick anyone.
fn scoped_employee(auth: &AuthUser, requested: Option<u64>) -> AppResult<Option<u64>> {
    if !auth.is_staff() {
        return Ok(requested);
    }
    let own = auth.employee_id_required()?;
    match requested {
        Some(other) if other != own => {
            Err(AppError::Forbidden("Staff can only view their own attendance".into()))
        }
        _ => Ok(Some(own)),
    }
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = ClockReq,
    responses(
        (status = 201, description = "Checked in; lateness evaluated against the shift", body = CheckInResponse),
        (status = 403, description = "User has no employee profile"),
        (status = 404, description = "Unknown shift"),
        (status = 409, description = "Already checked in for this shift today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(skip(auth, pool, cache, payload), fields(user_id = auth.user_id, shift_id = payload.shift_id))]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PayrollCache>,
    payload: web::Json<ClockReq>,
) -> AppResult<HttpResponse> {
    let employee_id = auth.employee_id_required()?;

    let shift = directory::find_shift(pool.get_ref(), payload.shift_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("shift {}", payload.shift_id)))?;

    let now = Local::now().naive_local();
    let date = now.date();
    let (status, late_minutes) = evaluate_check_in(&shift, date, now);

    let id = records::insert_check_in(
        pool.get_ref(),
        employee_id,
        shift.id,
        date,
        now,
        status,
        late_minutes,
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Already checked in for this shift today".into())
        } else {
            AppError::from(e)
        }
    })?;

    cache.invalidate_all();
    info!(employee_id, attendance_id = id, %status, late_minutes, "Checked in");

    Ok(HttpResponse::Created().json(CheckInResponse {
        id,
        date,
        status,
        late_minutes,
    }))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body = ClockReq,
    responses(
        (status = 200, description = "Checked out", body = Object, example = json!({ "work_hours": 8.5 })),
        (status = 403, description = "User has no employee profile"),
        (status = 409, description = "No open check-in for this shift")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(skip(auth, pool, cache, payload), fields(user_id = auth.user_id, shift_id = payload.shift_id))]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PayrollCache>,
    payload: web::Json<ClockReq>,
) -> AppResult<HttpResponse> {
    let employee_id = auth.employee_id_required()?;
    let now = Local::now().naive_local();

    let hours = records::record_check_out(pool.get_ref(), employee_id, payload.shift_id, now.date(), now)
        .await?
        .ok_or_else(|| AppError::InvalidState("No open check-in found for this shift".into()))?;

    cache.invalidate_all();
    info!(employee_id, work_hours = hours, "Checked out");

    Ok(HttpResponse::Ok().json(json!({ "work_hours": hours })))
}

/// Writes `absent` rows for everyone who never checked in to the shift.
#[utoipa::path(
    post,
    path = "/api/attendance/absences",
    request_body = AbsenceSweepReq,
    responses(
        (status = 200, description = "Number of absences recorded", body = Object, example = json!({ "marked": 3 })),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Unknown shift")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(skip(auth, pool, cache, payload), fields(user_id = auth.user_id, date = %payload.date))]
pub async fn mark_absences(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PayrollCache>,
    payload: web::Json<AbsenceSweepReq>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    if payload.date > Local::now().date_naive() {
        return Err(AppError::validation("cannot record absences for a future date"));
    }
    if directory::find_shift(pool.get_ref(), payload.shift_id).await?.is_none() {
        return Err(AppError::not_found(format!("shift {}", payload.shift_id)));
    }

    let marked =
        records::mark_absentees(pool.get_ref(), payload.date, payload.shift_id, payload.department_id)
            .await?;

    if marked > 0 {
        cache.invalidate_all();
    }
    info!(marked, "Absence sweep finished");

    Ok(HttpResponse::Ok().json(json!({ "marked": marked })))
}

#[utoipa::path(
    get,
    path = "/api/attendance/daily",
    params(DailyQuery),
    responses(
        (status = 200, description = "Records grouped per employee for the day", body = [EmployeeDayGroup])
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(skip(auth, pool), fields(user_id = auth.user_id))]
pub async fn daily_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DailyQuery>,
) -> AppResult<HttpResponse> {
    let employee_id = scoped_employee(&auth, None)?;

    let filter = RecordFilter {
        from: query.date,
        to: query.date,
        department_id: query.department_id,
        employee_id,
    };
    let rows = records::fetch_records(pool.get_ref(), &filter).await?;
    let groups = group_by_employee_and_day(&rows, query.date)?;

    Ok(HttpResponse::Ok().json(groups))
}

#[utoipa::path(
    get,
    path = "/api/attendance/monthly",
    params(MonthlyQuery),
    responses(
        (status = 200, description = "Month calendar per employee; every day is `not_recorded` or `recorded`", body = Object),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Staff asking for another employee")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(skip(auth, pool), fields(user_id = auth.user_id))]
pub async fn monthly_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthlyQuery>,
) -> AppResult<HttpResponse> {
    let employee_id = scoped_employee(&auth, query.employee_id)?;
    let (from, to) = month_bounds(query.year, query.month)?;

    let filter = RecordFilter {
        from,
        to,
        department_id: query.department_id,
        employee_id,
    };
    let rows = records::fetch_records(pool.get_ref(), &filter).await?;
    let groups = group_by_employee_and_month(&rows, query.year, query.month)?;

    Ok(HttpResponse::Ok().json(groups))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn user(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "u".into(),
            role,
            employee_id,
        }
    }

    #[test]
    fn staff_are_pinned_to_themselves() {
        let staff = user(Role::Staff, Some(4));
        assert_eq!(scoped_employee(&staff, None).unwrap(), Some(4));
        assert_eq!(scoped_employee(&staff, Some(4)).unwrap(), Some(4));
        assert_eq!(scoped_employee(&staff, Some(5)).unwrap_err().kind(), "forbidden");
    }

    #[test]
    fn hr_may_see_everyone_or_anyone() {
        let hr = user(Role::Hr, None);
        assert_eq!(scoped_employee(&hr, None).unwrap(), None);
        assert_eq!(scoped_employee(&hr, Some(9)).unwrap(), Some(9));
    }
}
