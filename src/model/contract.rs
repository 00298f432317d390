use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Contract {
    pub id: u64,
    pub employee_id: u64,
    /// Monthly base salary
    #[schema(example = 4000000.0)]
    pub salary: f64,
    #[schema(value_type = String, format = "date", example = "2024-01-01")]
    pub start_date: NaiveDate,
    /// Open-ended when absent
    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
}
