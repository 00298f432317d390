use std::sync::Arc;

use actix_web::{
    HttpResponse,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    web,
};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{debug, info, instrument};
use utoipa::IntoParams;

use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{AppError, AppResult},
    service::{
        aggregation::month_bounds,
        payroll::{PayrollLine, compute_monthly_payroll, compute_payroll_batch, export_monthly_payroll},
    },
    store::{
        attendance::{RecordFilter, fetch_records},
        contract, directory,
    },
    utils::payroll_cache::{PayrollCache, PayrollKey},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct PayrollQuery {
    pub year: i32,
    pub month: u32,
    pub department_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PeriodQuery {
    pub year: i32,
    pub month: u32,
}

async fn monthly_batch(
    pool: &MySqlPool,
    config: &Config,
    cache: &PayrollCache,
    query: &PayrollQuery,
) -> AppResult<Arc<Vec<PayrollLine>>> {
    let key = PayrollKey {
        year: query.year,
        month: query.month,
        department_id: query.department_id,
    };
    if let Some(lines) = cache.get(&key).await {
        debug!(?key, "Payroll cache hit");
        return Ok(lines);
    }

    let policy = config.payroll_policy();
    policy.validate()?;
    let (from, to) = month_bounds(query.year, query.month)?;

    let roster = directory::payroll_roster(pool, from, to, query.department_id).await?;
    let contracts = contract::active_contracts(pool, from, to).await?;
    let records = fetch_records(
        pool,
        &RecordFilter {
            from,
            to,
            department_id: query.department_id,
            employee_id: None,
        },
    )
    .await?;

    let lines = compute_payroll_batch(&roster, &contracts, &records, query.year, query.month, &policy)?;
    info!(?key, employees = lines.len(), "Payroll computed");

    Ok(cache.insert(key, lines).await)
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, description = "One line per employee, sorted by name", body = [PayrollLine]),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "HR/Admin only"),
        (status = 500, description = "Payroll policy misconfigured")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, config, cache), fields(user_id = auth.user_id))]
pub async fn monthly_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    cache: web::Data<PayrollCache>,
    query: web::Query<PayrollQuery>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let lines = monthly_batch(pool.get_ref(), &config, &cache, &query).await?;

    Ok(HttpResponse::Ok().json(lines.as_slice()))
}

#[utoipa::path(
    get,
    path = "/api/payroll/export",
    params(PayrollQuery),
    responses(
        (status = 200, description = "CSV attachment with a header row", content_type = "text/csv", body = String),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, config, cache), fields(user_id = auth.user_id))]
pub async fn export_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    cache: web::Data<PayrollCache>,
    query: web::Query<PayrollQuery>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let lines = monthly_batch(pool.get_ref(), &config, &cache, &query).await?;
    let csv = export_monthly_payroll(&lines);

    let filename = match query.department_id {
        Some(department) => format!("payroll_{}-{:02}_dept{}.csv", query.year, query.month, department),
        None => format!("payroll_{}-{:02}.csv", query.year, query.month),
    };

    Ok(HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, "text/csv; charset=utf-8"))
        .insert_header((CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")))
        .body(csv))
}

/// Single employee's pay for a month. Staff may only fetch their own.
#[utoipa::path(
    get,
    path = "/api/payroll/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID"), PeriodQuery),
    responses(
        (status = 200, description = "Payroll line", body = PayrollLine),
        (status = 403, description = "Another employee's pay"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, config), fields(user_id = auth.user_id))]
pub async fn employee_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    query: web::Query<PeriodQuery>,
) -> AppResult<HttpResponse> {
    let employee_id = path.into_inner();
    if auth.is_staff() && auth.employee_id != Some(employee_id) {
        return Err(AppError::Forbidden("Staff can only view their own pay".into()));
    }

    let employee = directory::employee_ref(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("employee {employee_id}")))?;

    let (from, to) = month_bounds(query.year, query.month)?;
    let active = contract::active_contract(pool.get_ref(), employee_id, from, to).await?;
    let records = fetch_records(
        pool.get_ref(),
        &RecordFilter {
            from,
            to,
            department_id: None,
            employee_id: Some(employee_id),
        },
    )
    .await?;

    let line = compute_monthly_payroll(
        &employee,
        active.as_ref(),
        &records,
        query.year,
        query.month,
        &config.payroll_policy(),
    )?;

    Ok(HttpResponse::Ok().json(line))
}
