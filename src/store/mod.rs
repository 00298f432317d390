pub mod attendance;
pub mod contract;
pub mod correction;
pub mod directory;
#[cfg(test)]
pub mod memory;
