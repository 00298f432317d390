use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestType {
    ForgotCheckin,
    ForgotCheckout,
    EditTime,
    Leave,
}

impl RequestType {
    /// True for every type that proposes new check-in/check-out times.
    pub fn edits_time(self) -> bool {
        !matches!(self, RequestType::Leave)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CorrectionRequest {
    pub id: u64,
    pub employee_id: u64,
    pub shift_id: u64,
    #[schema(value_type = String, format = "date", example = "2024-03-01")]
    pub date: NaiveDate,
    pub request_type: RequestType,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub new_check_in: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub new_check_out: Option<NaiveDateTime>,
    pub reason: String,
    pub status: RequestStatus,
    pub reviewer_id: Option<u64>,
    pub reviewer_notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub reviewed_at: Option<NaiveDateTime>,
}

/// A validated submission, ready to be stored as `pending`.
#[derive(Debug, Clone)]
pub struct NewCorrection {
    pub employee_id: u64,
    pub shift_id: u64,
    pub date: NaiveDate,
    pub request_type: RequestType,
    pub new_check_in: Option<NaiveDateTime>,
    pub new_check_out: Option<NaiveDateTime>,
    pub reason: String,
    pub created_at: NaiveDateTime,
}

/// Reviewer decision written by the compare-and-set transition.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub status: RequestStatus,
    pub reviewer_id: u64,
    pub notes: Option<String>,
    pub reviewed_at: NaiveDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct CorrectionRow {
    pub id: u64,
    pub employee_id: u64,
    pub shift_id: u64,
    pub date: NaiveDate,
    pub request_type: String,
    pub new_check_in: Option<NaiveDateTime>,
    pub new_check_out: Option<NaiveDateTime>,
    pub reason: String,
    pub status: String,
    pub reviewer_id: Option<u64>,
    pub reviewer_notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub reviewed_at: Option<NaiveDateTime>,
}

impl TryFrom<CorrectionRow> for CorrectionRequest {
    type Error = AppError;

    fn try_from(row: CorrectionRow) -> Result<Self, Self::Error> {
        let request_type = row.request_type.parse::<RequestType>().map_err(|_| {
            AppError::internal(format!(
                "correction {} has unknown type {:?}",
                row.id, row.request_type
            ))
        })?;
        let status = row.status.parse::<RequestStatus>().map_err(|_| {
            AppError::internal(format!(
                "correction {} has unknown status {:?}",
                row.id, row.status
            ))
        })?;

        Ok(Self {
            id: row.id,
            employee_id: row.employee_id,
            shift_id: row.shift_id,
            date: row.date,
            request_type,
            new_check_in: row.new_check_in,
            new_check_out: row.new_check_out,
            reason: row.reason,
            status,
            reviewer_id: row.reviewer_id,
            reviewer_notes: row.reviewer_notes,
            created_at: row.created_at,
            reviewed_at: row.reviewed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_snake_case() {
        assert_eq!(RequestType::ForgotCheckin.to_string(), "forgot_checkin");
        assert_eq!(
            "edit_time".parse::<RequestType>().unwrap(),
            RequestType::EditTime
        );
        assert_eq!(
            serde_json::to_string(&RequestStatus::Pending).unwrap(),
            "\"pending\""
        );
    }

    #[test]
    fn only_leave_carries_no_times() {
        assert!(RequestType::ForgotCheckin.edits_time());
        assert!(RequestType::ForgotCheckout.edits_time());
        assert!(RequestType::EditTime.edits_time());
        assert!(!RequestType::Leave.edits_time());
    }
}
