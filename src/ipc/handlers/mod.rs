pub mod academic;
pub mod accounts;
pub mod cells;
pub mod core;
pub mod payroll;
pub mod reports;
pub mod roster;
pub mod setup;
