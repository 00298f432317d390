pub mod attendance;
pub mod contract;
pub mod correction;
pub mod department;
pub mod employee;
pub mod payroll;
pub mod position;
pub mod shift;
pub mod users;
