pub mod core;
pub mod export;
pub mod reports;
pub mod students;
