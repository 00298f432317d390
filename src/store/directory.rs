use chrono::NaiveDate;
use sqlx::{MySql, MySqlPool};

use crate::{
    error::AppResult,
    model::{employee::EmployeeRef, shift::Shift},
};

pub async fn find_shift<'e, E>(executor: E, shift_id: u64) -> AppResult<Option<Shift>>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let shift = sqlx::query_as::<_, Shift>(
        r#"
        SELECT id, name, start_time, end_time, late_grace_minutes
        FROM shifts
        WHERE id = ?
        "#,
    )
    .bind(shift_id)
    .fetch_optional(executor)
    .await?;

    Ok(shift)
}

pub async fn employee_ref(pool: &MySqlPool, employee_id: u64) -> AppResult<Option<EmployeeRef>> {
    let employee = sqlx::query_as::<_, EmployeeRef>(
        r#"
        SELECT id, CONCAT(first_name, ' ', last_name) AS name
        FROM employees
        WHERE id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;

    Ok(employee)
}

/// Employees payable for a period: everyone active, plus anyone who has
/// attendance inside the period even if no longer active.
pub async fn payroll_roster(
    pool: &MySqlPool,
    from: NaiveDate,
    to: NaiveDate,
    department_id: Option<u64>,
) -> AppResult<Vec<EmployeeRef>> {
    let mut sql = String::from(
        r#"
        SELECT e.id, CONCAT(e.first_name, ' ', e.last_name) AS name
        FROM employees e
        WHERE (
            e.status = 'active'
            OR EXISTS (
                SELECT 1 FROM attendance a
                WHERE a.employee_id = e.id AND a.date BETWEEN ? AND ?
            )
        )
        "#,
    );
    if department_id.is_some() {
        sql.push_str(" AND e.department_id = ?");
    }
    sql.push_str(" ORDER BY e.id");

    let mut query = sqlx::query_as::<_, EmployeeRef>(&sql).bind(from).bind(to);
    if let Some(department_id) = department_id {
        query = query.bind(department_id);
    }

    Ok(query.fetch_all(pool).await?)
}
