use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::contract::Contract,
    store::directory,
    utils::payroll_cache::PayrollCache,
};

#[derive(Deserialize, ToSchema)]
pub struct ContractReq {
    #[schema(example = 4000000.0)]
    pub salary: f64,
    #[schema(value_type = String, format = "date", example = "2024-01-01")]
    pub start_date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
}

fn validate(payload: &ContractReq) -> AppResult<()> {
    if !payload.salary.is_finite() || payload.salary < 0.0 {
        return Err(AppError::validation("salary must be a non-negative number"));
    }
    if let Some(end) = payload.end_date {
        if end < payload.start_date {
            return Err(AppError::validation("end_date must not precede start_date"));
        }
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/employees/{employee_id}/contracts",
    params(("employee_id", Path, description = "Employee ID")),
    request_body = ContractReq,
    responses(
        (status = 201, description = "Contract created", body = Contract),
        (status = 404, description = "Employee not found")
    ),
    tag = "Directory",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, cache, payload), fields(user_id = auth.user_id))]
pub async fn create_contract(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PayrollCache>,
    path: web::Path<u64>,
    payload: web::Json<ContractReq>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();
    validate(&payload)?;

    if directory::employee_ref(pool.get_ref(), employee_id).await?.is_none() {
        return Err(AppError::not_found(format!("employee {employee_id}")));
    }

    let result = sqlx::query(
        "INSERT INTO contracts (employee_id, salary, start_date, end_date) VALUES (?, ?, ?, ?)",
    )
    .bind(employee_id)
    .bind(payload.salary)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .execute(pool.get_ref())
    .await?;

    cache.invalidate_all();

    let contract = Contract {
        id: result.last_insert_id(),
        employee_id,
        salary: payload.salary,
        start_date: payload.start_date,
        end_date: payload.end_date,
    };
    info!(contract_id = contract.id, employee_id, "Contract created");

    Ok(HttpResponse::Created().json(contract))
}

#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}/contracts",
    params(("employee_id", Path, description = "Employee ID")),
    responses((status = 200, description = "Contracts, newest first", body = [Contract])),
    tag = "Directory",
    security(("bearer_auth" = []))
)]
pub async fn list_contracts(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let employee_id = path.into_inner();
    if auth.is_staff() && auth.employee_id != Some(employee_id) {
        return Err(AppError::Forbidden("Staff can only view their own contracts".into()));
    }

    let contracts = sqlx::query_as::<_, Contract>(
        r#"
        SELECT id, employee_id, salary, start_date, end_date
        FROM contracts
        WHERE employee_id = ?
        ORDER BY start_date DESC, id DESC
        "#,
    )
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(contracts))
}

#[utoipa::path(
    put,
    path = "/api/contracts/{id}",
    params(("id", Path, description = "Contract ID")),
    request_body = ContractReq,
    responses(
        (status = 200, description = "Contract updated", body = Contract),
        (status = 404, description = "Contract not found")
    ),
    tag = "Directory",
    security(("bearer_auth" = []))
)]
#[instrument(skip(auth, pool, cache, payload), fields(user_id = auth.user_id))]
pub async fn update_contract(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<PayrollCache>,
    path: web::Path<u64>,
    payload: web::Json<ContractReq>,
) -> AppResult<HttpResponse> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();
    validate(&payload)?;

    let employee_id = sqlx::query_scalar::<_, u64>("SELECT employee_id FROM contracts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found(format!("contract {id}")))?;

    sqlx::query("UPDATE contracts SET salary = ?, start_date = ?, end_date = ? WHERE id = ?")
        .bind(payload.salary)
        .bind(payload.start_date)
        .bind(payload.end_date)
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    cache.invalidate_all();
    info!(contract_id = id, "Contract updated");

    Ok(HttpResponse::Ok().json(Contract {
        id,
        employee_id,
        salary: payload.salary,
        start_date: payload.start_date,
        end_date: payload.end_date,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(salary: f64, end: Option<(i32, u32, u32)>) -> ContractReq {
        ContractReq {
            salary,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: end.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
        }
    }

    #[test]
    fn open_ended_contract_is_valid() {
        assert!(validate(&req(4_000_000.0, None)).is_ok());
    }

    #[test]
    fn negative_salary_and_inverted_dates_are_rejected() {
        assert!(validate(&req(-1.0, None)).is_err());
        assert!(validate(&req(f64::NAN, None)).is_err());
        assert!(validate(&req(100.0, Some((2023, 12, 31)))).is_err());
    }
}
