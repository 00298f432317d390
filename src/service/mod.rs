pub mod aggregation;
pub mod correction;
pub mod payroll;
pub mod timekeeping;
