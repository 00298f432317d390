pub mod attendance;
pub mod contract;
pub mod correction;
pub mod department;
pub mod employee;
pub mod page;
pub mod position;
pub mod role;
pub mod shift;
pub mod user;
