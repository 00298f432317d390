use sqlx::MySqlPool;
use tracing::{debug, error};

use crate::{
    error::{AppError, AppResult},
    model::{
        correction::{CorrectionRequest, CorrectionRow, NewCorrection, RequestStatus, Resolution},
        page::{PageRequest, Paginated},
    },
    service::{
        correction::{CorrectionFilter, CorrectionStore},
        timekeeping::merge_correction,
    },
    store::{attendance, directory},
};

const CORRECTION_COLUMNS: &str = r#"
    id, employee_id, shift_id, date, request_type, new_check_in, new_check_out,
    reason, status, reviewer_id, reviewer_notes, created_at, reviewed_at
"#;

#[derive(Clone)]
pub struct MySqlCorrectionStore {
    pool: MySqlPool,
}

impl MySqlCorrectionStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

enum FilterValue {
    U64(u64),
    Status(RequestStatus),
}

fn where_clause(filter: &CorrectionFilter) -> (String, Vec<FilterValue>) {
    let mut sql = String::from(" WHERE 1=1");
    let mut values = Vec::new();

    if let Some(employee_id) = filter.employee_id {
        sql.push_str(" AND employee_id = ?");
        values.push(FilterValue::U64(employee_id));
    }
    if let Some(status) = filter.status {
        sql.push_str(" AND status = ?");
        values.push(FilterValue::Status(status));
    }

    (sql, values)
}

impl CorrectionStore for MySqlCorrectionStore {
    async fn shift_exists(&self, shift_id: u64) -> AppResult<bool> {
        Ok(directory::find_shift(&self.pool, shift_id).await?.is_some())
    }

    async fn insert(&self, new: NewCorrection) -> AppResult<CorrectionRequest> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_corrections
                (employee_id, shift_id, date, request_type, new_check_in, new_check_out,
                 reason, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(new.employee_id)
        .bind(new.shift_id)
        .bind(new.date)
        .bind(new.request_type.to_string())
        .bind(new.new_check_in)
        .bind(new.new_check_out)
        .bind(new.reason.as_str())
        .bind(new.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id = new.employee_id, "Failed to insert correction request");
            AppError::from(e)
        })?;

        let id = result.last_insert_id();
        self.find(id)
            .await?
            .ok_or_else(|| AppError::internal(format!("correction request {id} vanished after insert")))
    }

    async fn find(&self, id: u64) -> AppResult<Option<CorrectionRequest>> {
        let sql = format!("SELECT {CORRECTION_COLUMNS} FROM attendance_corrections WHERE id = ?");
        let row = sqlx::query_as::<_, CorrectionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CorrectionRequest::try_from).transpose()
    }

    async fn list(
        &self,
        filter: &CorrectionFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<CorrectionRequest>> {
        let (where_sql, values) = where_clause(filter);

        let data_sql = format!(
            "SELECT {CORRECTION_COLUMNS} FROM attendance_corrections{where_sql} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let count_sql = format!("SELECT COUNT(*) FROM attendance_corrections{where_sql}");

        let mut data_query = sqlx::query_as::<_, CorrectionRow>(&data_sql);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for value in &values {
            match value {
                FilterValue::U64(v) => {
                    data_query = data_query.bind(*v);
                    count_query = count_query.bind(*v);
                }
                FilterValue::Status(v) => {
                    data_query = data_query.bind(v.to_string());
                    count_query = count_query.bind(v.to_string());
                }
            }
        }

        let rows = data_query
            .bind(page.per_page)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        let total = count_query.fetch_one(&self.pool).await?;

        let data = rows
            .into_iter()
            .map(CorrectionRequest::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Paginated::new(data, page, total))
    }

    async fn resolve_pending(
        &self,
        request: &CorrectionRequest,
        resolution: &Resolution,
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE attendance_corrections
            SET status = ?, reviewer_id = ?, reviewer_notes = ?, reviewed_at = ?
            WHERE id = ?
            AND status = 'pending'
            "#,
        )
        .bind(resolution.status.to_string())
        .bind(resolution.reviewer_id)
        .bind(resolution.notes.as_deref())
        .bind(resolution.reviewed_at)
        .bind(request.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(request_id = request.id, "Correction request no longer pending");
            return Ok(false);
        }

        if resolution.status == RequestStatus::Approved && request.request_type.edits_time() {
            let shift = directory::find_shift(&mut *tx, request.shift_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("shift {}", request.shift_id)))?;

            let existing = attendance::find_times_for_update(
                &mut tx,
                request.employee_id,
                request.shift_id,
                request.date,
            )
            .await?;
            let merged = merge_correction(existing.as_ref(), request, &shift);

            attendance::upsert_times(
                &mut tx,
                request.employee_id,
                request.shift_id,
                request.date,
                &merged,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
