use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{MySqlConnection, MySqlPool};

use crate::{
    error::{AppError, AppResult},
    model::attendance::{AttendanceRecord, AttendanceRow, AttendanceStatus, AttendanceTimes},
    service::timekeeping::work_hours,
};

/// Date window and optional scoping of a record query. Both ends inclusive.
#[derive(Debug, Clone, Copy)]
pub struct RecordFilter {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub department_id: Option<u64>,
    pub employee_id: Option<u64>,
}

const RECORD_COLUMNS: &str = r#"
    a.id,
    a.employee_id,
    CONCAT(e.first_name, ' ', e.last_name) AS employee_name,
    a.shift_id,
    a.date,
    a.check_in,
    a.check_out,
    a.work_hours,
    a.status,
    a.late_minutes
"#;

pub async fn fetch_records(pool: &MySqlPool, filter: &RecordFilter) -> AppResult<Vec<AttendanceRecord>> {
    let mut sql = format!(
        "SELECT {RECORD_COLUMNS} FROM attendance a JOIN employees e ON e.id = a.employee_id WHERE a.date BETWEEN ? AND ?"
    );
    if filter.department_id.is_some() {
        sql.push_str(" AND e.department_id = ?");
    }
    if filter.employee_id.is_some() {
        sql.push_str(" AND a.employee_id = ?");
    }
    sql.push_str(" ORDER BY a.date, a.employee_id, a.id");

    let mut query = sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(filter.from)
        .bind(filter.to);
    if let Some(department_id) = filter.department_id {
        query = query.bind(department_id);
    }
    if let Some(employee_id) = filter.employee_id {
        query = query.bind(employee_id);
    }

    let rows = query.fetch_all(pool).await.map_err(|e| {
        tracing::error!(error = %e, ?filter, "Failed to fetch attendance records");
        AppError::from(e)
    })?;

    rows.into_iter().map(AttendanceRecord::try_from).collect()
}

/// Inserts today's check-in. A second check-in for the same shift and date
/// fails on the unique key and surfaces as a sqlx database error.
pub async fn insert_check_in(
    pool: &MySqlPool,
    employee_id: u64,
    shift_id: u64,
    date: NaiveDate,
    check_in: NaiveDateTime,
    status: AttendanceStatus,
    late_minutes: u32,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance
            (employee_id, shift_id, date, check_in, check_out, work_hours, status, late_minutes)
        VALUES (?, ?, ?, ?, NULL, 0, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(shift_id)
    .bind(date)
    .bind(check_in)
    .bind(status.to_string())
    .bind(late_minutes)
    .execute(pool)
    .await?;

    Ok(result.last_insert_id())
}

#[derive(sqlx::FromRow)]
struct OpenCheckIn {
    id: u64,
    check_in: NaiveDateTime,
}

/// Closes the newest open record of the shift started on `date` or the day
/// before (shifts may cross midnight). Returns the worked hours, or `None`
/// when nothing was open.
pub async fn record_check_out(
    pool: &MySqlPool,
    employee_id: u64,
    shift_id: u64,
    date: NaiveDate,
    check_out: NaiveDateTime,
) -> AppResult<Option<f64>> {
    let previous = date.pred_opt().unwrap_or(date);

    let open = sqlx::query_as::<_, OpenCheckIn>(
        r#"
        SELECT id, check_in
        FROM attendance
        WHERE employee_id = ?
        AND shift_id = ?
        AND date BETWEEN ? AND ?
        AND check_in IS NOT NULL
        AND check_out IS NULL
        ORDER BY date DESC
        LIMIT 1
        "#,
    )
    .bind(employee_id)
    .bind(shift_id)
    .bind(previous)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    let Some(open) = open else {
        return Ok(None);
    };

    let hours = work_hours(Some(open.check_in), Some(check_out));
    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?, work_hours = ?
        WHERE id = ?
        AND check_out IS NULL
        "#,
    )
    .bind(check_out)
    .bind(hours)
    .bind(open.id)
    .execute(pool)
    .await?;

    Ok((result.rows_affected() > 0).then_some(hours))
}

#[derive(sqlx::FromRow)]
struct TimesRow {
    check_in: Option<NaiveDateTime>,
    check_out: Option<NaiveDateTime>,
    work_hours: Option<f64>,
    status: String,
    late_minutes: u32,
}

/// Locks and reads the mutable part of one attendance row inside a transaction.
pub async fn find_times_for_update(
    conn: &mut MySqlConnection,
    employee_id: u64,
    shift_id: u64,
    date: NaiveDate,
) -> AppResult<Option<AttendanceTimes>> {
    let row = sqlx::query_as::<_, TimesRow>(
        r#"
        SELECT check_in, check_out, work_hours, status, late_minutes
        FROM attendance
        WHERE employee_id = ? AND shift_id = ? AND date = ?
        FOR UPDATE
        "#,
    )
    .bind(employee_id)
    .bind(shift_id)
    .bind(date)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| {
        let status = row
            .status
            .parse::<AttendanceStatus>()
            .map_err(|_| AppError::internal(format!("unknown attendance status {:?}", row.status)))?;
        Ok(AttendanceTimes {
            check_in: row.check_in,
            check_out: row.check_out,
            work_hours: row.work_hours.filter(|h| h.is_finite() && *h >= 0.0).unwrap_or(0.0),
            status,
            late_minutes: row.late_minutes,
        })
    })
    .transpose()
}

pub async fn upsert_times(
    conn: &mut MySqlConnection,
    employee_id: u64,
    shift_id: u64,
    date: NaiveDate,
    times: &AttendanceTimes,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO attendance
            (employee_id, shift_id, date, check_in, check_out, work_hours, status, late_minutes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            check_in = VALUES(check_in),
            check_out = VALUES(check_out),
            work_hours = VALUES(work_hours),
            status = VALUES(status),
            late_minutes = VALUES(late_minutes)
        "#,
    )
    .bind(employee_id)
    .bind(shift_id)
    .bind(date)
    .bind(times.check_in)
    .bind(times.check_out)
    .bind(times.work_hours)
    .bind(times.status.to_string())
    .bind(times.late_minutes)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Writes an explicit `absent` row for every active employee (optionally of
/// one department) that has no row for the shift on `date`.
pub async fn mark_absentees(
    pool: &MySqlPool,
    date: NaiveDate,
    shift_id: u64,
    department_id: Option<u64>,
) -> AppResult<u64> {
    let mut sql = String::from(
        r#"
        INSERT INTO attendance
            (employee_id, shift_id, date, check_in, check_out, work_hours, status, late_minutes)
        SELECT e.id, ?, ?, NULL, NULL, 0, 'absent', 0
        FROM employees e
        WHERE e.status = 'active'
        AND NOT EXISTS (
            SELECT 1 FROM attendance a
            WHERE a.employee_id = e.id AND a.shift_id = ? AND a.date = ?
        )
        "#,
    );
    if department_id.is_some() {
        sql.push_str(" AND e.department_id = ?");
    }

    let mut query = sqlx::query(&sql)
        .bind(shift_id)
        .bind(date)
        .bind(shift_id)
        .bind(date);
    if let Some(department_id) = department_id {
        query = query.bind(department_id);
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}
