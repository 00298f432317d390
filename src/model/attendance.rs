use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AttendanceStatus {
    OnTime,
    Late,
    Absent,
}

/// One check-in/check-out pair for one employee on one shift and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub employee_id: u64,
    /// Display name resolved from the employee row
    pub employee_name: String,
    pub shift_id: u64,
    #[schema(value_type = String, format = "date", example = "2024-03-01")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<NaiveDateTime>,
    pub work_hours: Option<f64>,
    pub status: AttendanceStatus,
    pub late_minutes: u32,
}

impl AttendanceRecord {
    /// Worked hours counted by reports. Missing, non-finite and negative
    /// values count as zero so one bad row cannot sink a whole report.
    pub fn effective_hours(&self) -> f64 {
        match self.work_hours {
            Some(h) if h.is_finite() && h >= 0.0 => h,
            other => {
                if other.is_some() {
                    tracing::debug!(record_id = self.id, work_hours = ?other, "Coercing malformed work hours to 0");
                }
                0.0
            }
        }
    }
}

/// Raw `attendance` row joined with the employee's name.
#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub employee_id: u64,
    pub employee_name: String,
    pub shift_id: u64,
    pub date: NaiveDate,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub work_hours: Option<f64>,
    pub status: String,
    pub late_minutes: u32,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = AppError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<AttendanceStatus>().map_err(|_| {
            AppError::internal(format!(
                "attendance {} has unknown status {:?}",
                row.id, row.status
            ))
        })?;

        Ok(Self {
            id: row.id,
            employee_id: row.employee_id,
            employee_name: row.employee_name,
            shift_id: row.shift_id,
            date: row.date,
            check_in: row.check_in,
            check_out: row.check_out,
            work_hours: row.work_hours,
            status,
            late_minutes: row.late_minutes,
        })
    }
}

/// The mutable part of an attendance row, as written by check-in/out and corrections.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceTimes {
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub work_hours: f64,
    pub status: AttendanceStatus,
    pub late_minutes: u32,
}
