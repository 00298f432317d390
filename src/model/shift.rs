use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A named work period. `end_time <= start_time` means the shift crosses midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Shift {
    pub id: u64,
    #[schema(example = "Morning")]
    pub name: String,
    #[schema(value_type = String, format = "time", example = "08:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, format = "time", example = "17:00:00")]
    pub end_time: NaiveTime,
    /// Minutes after `start_time` before a check-in counts as late
    #[schema(example = 5)]
    pub late_grace_minutes: u32,
}
