pub mod db_utils;
pub mod payroll_cache;
pub mod username_index;
