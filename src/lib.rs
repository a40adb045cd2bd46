//! School results engine: result-cell storage, class and student reports
//! with tie-aware positions, subject statistics, and payroll deductions.
//!
//! The `resultsd` binary serves this API as newline-delimited JSON over
//! stdin/stdout against a SQLite workspace.

pub mod academic;
pub mod accounts;
pub mod calc;
pub mod config;
pub mod db;
pub mod error;
pub mod infos;
pub mod payroll;
pub mod reports;
pub mod roster;
pub mod store;

pub use academic::{resolve_academic_context, AcademicContext, ContextRequest};
pub use error::{Result, ResultsError};
pub use reports::{compute_class_results, compute_form_status, compute_student_report};
pub use store::{bulk_create_cells as bulk_create_result_cells, delete_cells as delete_result_cells};
