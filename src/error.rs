use thiserror::Error;

/// Errors surfaced by the results engine and its store gateway.
///
/// The engine never logs or retries; every failure is returned to the caller
/// as one of these variants.
#[derive(Debug, Error)]
pub enum ResultsError {
    /// A slot of the (session, term, exam) triple was not supplied and no
    /// entity of that kind is flagged current.
    #[error("no current {slot} is set")]
    ContextNotSet { slot: &'static str },

    #[error("{kind} not found: {id}")]
    UnknownAcademicEntity { kind: &'static str, id: String },

    #[error("class not found: {0}")]
    UnknownClass(String),

    #[error("student not found: {0}")]
    UnknownStudent(String),

    #[error("subject not found: {0}")]
    UnknownSubject(String),

    #[error("result cell not found: {0}")]
    UnknownCell(String),

    #[error("staff member not found: {0}")]
    UnknownStaff(String),

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// HELSB (or another percentage rate) outside `[0, 100]`.
    #[error("invalid rate: {0}")]
    InvalidRate(String),

    #[error("invalid score: {0}")]
    InvalidScore(String),

    /// Negative fixed deduction or malformed money value.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Behaviour rating outside A..F, unknown trait, or malformed date.
    #[error("invalid student infos: {0}")]
    InvalidInfos(String),

    #[error("account already exists: {0}")]
    DuplicateAccount(String),

    /// An atomic store operation could not be completed and was rolled back.
    #[error("store conflict: {0}")]
    StoreConflict(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl ResultsError {
    /// Stable snake_case code used in IPC error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ContextNotSet { .. } => "context_not_set",
            Self::UnknownAcademicEntity { .. } => "unknown_academic_entity",
            Self::UnknownClass(_) => "unknown_class",
            Self::UnknownStudent(_) => "unknown_student",
            Self::UnknownSubject(_) => "unknown_subject",
            Self::UnknownCell(_) => "unknown_cell",
            Self::UnknownStaff(_) => "unknown_staff",
            Self::InvalidPolicy(_) => "invalid_policy",
            Self::InvalidRate(_) => "invalid_rate",
            Self::InvalidScore(_) => "invalid_score",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InvalidInfos(_) => "invalid_infos",
            Self::DuplicateAccount(_) => "duplicate_account",
            Self::StoreConflict(_) => "store_conflict",
            Self::Store(_) => "db_query_failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, ResultsError>;

/// Maps a failure inside a write transaction to `StoreConflict`, keeping
/// the underlying message.
pub(crate) fn conflict(e: rusqlite::Error) -> ResultsError {
    ResultsError::StoreConflict(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_snake_case_and_distinct() {
        let errs = [
            ResultsError::ContextNotSet { slot: "term" },
            ResultsError::UnknownClass("c".into()),
            ResultsError::UnknownStudent("s".into()),
            ResultsError::UnknownSubject("x".into()),
            ResultsError::InvalidPolicy("p".into()),
            ResultsError::InvalidRate("r".into()),
            ResultsError::StoreConflict("k".into()),
        ];
        let mut codes: Vec<&str> = errs.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errs.len());
        assert!(codes
            .iter()
            .all(|c| c.chars().all(|ch| ch.is_ascii_lowercase() || ch == '_')));
    }

    #[test]
    fn context_not_set_names_the_slot() {
        let e = ResultsError::ContextNotSet { slot: "exam" };
        assert_eq!(e.to_string(), "no current exam is set");
    }
}
