use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::MySqlPool;

use crate::{error::AppResult, model::contract::Contract};

/// Contracts overlapping `[from, to]`, keyed by employee. When an employee has
/// several, the one that started last wins.
pub async fn active_contracts(
    pool: &MySqlPool,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<HashMap<u64, Contract>> {
    let rows = sqlx::query_as::<_, Contract>(
        r#"
        SELECT id, employee_id, salary, start_date, end_date
        FROM contracts
        WHERE start_date <= ?
        AND (end_date IS NULL OR end_date >= ?)
        ORDER BY employee_id, start_date DESC, id DESC
        "#,
    )
    .bind(to)
    .bind(from)
    .fetch_all(pool)
    .await?;

    let mut by_employee = HashMap::new();
    for contract in rows {
        by_employee.entry(contract.employee_id).or_insert(contract);
    }
    Ok(by_employee)
}

/// The contract an employee's pay for `[from, to]` is computed from, if any.
pub async fn active_contract(
    pool: &MySqlPool,
    employee_id: u64,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Option<Contract>> {
    let contract = sqlx::query_as::<_, Contract>(
        r#"
        SELECT id, employee_id, salary, start_date, end_date
        FROM contracts
        WHERE employee_id = ?
        AND start_date <= ?
        AND (end_date IS NULL OR end_date >= ?)
        ORDER BY start_date DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(employee_id)
    .bind(to)
    .bind(from)
    .fetch_optional(pool)
    .await?;

    Ok(contract)
}
