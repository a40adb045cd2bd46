//! Result computation: cell scoring, per-student aggregation, positions and
//! per-subject statistics. Everything here is pure over the cells it is
//! handed; loading them is the store's job.

pub mod aggregate;
pub mod policy;
pub mod ranking;
pub mod scoring;
pub mod subjects;

pub use aggregate::{aggregate_cohort, PassStatus, StudentAggregate, SubjectMark};
pub use policy::{GradeBand, GradingBands, ReportPolicy, SubjectRounding};
pub use ranking::{rank_cohort, tie_averaged_positions};
pub use scoring::{score, score_with, CellScore, ScoreFn};
pub use subjects::{subject_stats, SubjectStat};
