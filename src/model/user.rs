use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account as exposed by the admin endpoints; the password hash never leaves `UserSql`.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub role_id: u8,
    pub employee_id: Option<u64>,
    pub is_active: bool,
}
