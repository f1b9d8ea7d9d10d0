//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for eqindex.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid date range: {reason}")]
    InvalidDateRange { reason: String },

    #[error("no valid observations for {date}")]
    NoDataForDate { date: NaiveDate },

    #[error("invariant violated on {date}: {reason}")]
    InvariantViolation { date: NaiveDate, reason: String },

    #[error(
        "partial write on {date}: wrote {written:?}, failed writing {failed}: {reason}"
    )]
    PartialPersistenceFailure {
        date: NaiveDate,
        written: Vec<&'static str>,
        failed: &'static str,
        reason: String,
    },

    #[error("a build overlapping {start} to {end} is already running, retry later")]
    ConcurrentBuildConflict { start: NaiveDate, end: NaiveDate },

    #[error("import error: {reason}")]
    Import { reason: String },

    #[error("export error: {reason}")]
    Export { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// Whether re-running the same request can succeed without any input change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IndexError::PartialPersistenceFailure { .. }
                | IndexError::ConcurrentBuildConflict { .. }
                | IndexError::Database { .. }
                | IndexError::DatabaseQuery { .. }
        )
    }

    /// The trading date this error is attributed to, if any.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            IndexError::NoDataForDate { date }
            | IndexError::InvariantViolation { date, .. }
            | IndexError::PartialPersistenceFailure { date, .. } => Some(*date),
            _ => None,
        }
    }
}

impl From<&IndexError> for std::process::ExitCode {
    fn from(err: &IndexError) -> Self {
        let code: u8 = match err {
            IndexError::Io(_) => 1,
            IndexError::ConfigParse { .. }
            | IndexError::ConfigMissing { .. }
            | IndexError::ConfigInvalid { .. }
            | IndexError::InvalidDateRange { .. } => 2,
            IndexError::Database { .. } | IndexError::DatabaseQuery { .. } => 3,
            IndexError::InvariantViolation { .. } => 4,
            IndexError::NoDataForDate { .. } => 5,
            IndexError::PartialPersistenceFailure { .. }
            | IndexError::ConcurrentBuildConflict { .. } => 6,
            IndexError::Import { .. } | IndexError::Export { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}
