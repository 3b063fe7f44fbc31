use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("CSV parsing system error: {source}")]
    CsvSystemError {
        #[from]
        source: csv::Error,
    },

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },

    #[error("CSV data format error: {0}")]
    CsvDataFormatError(String),

    // Certificate inputs must all belong to the same obra.
    #[error("Project mismatch: {what} belongs to project {found}, expected project {expected}")]
    ProjectMismatch {
        what: String,
        expected: i64,
        found: i64,
    },

    #[error("Line item '{0}' has no entry in this measurement")]
    UnknownLineItem(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
}

impl EngineError {
    pub fn project_mismatch(what: impl Into<String>, expected: i64, found: i64) -> Self {
        EngineError::ProjectMismatch {
            what: what.into(),
            expected,
            found,
        }
    }

    /// Errors caused by the caller's input rather than the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EngineError::ProjectMismatch { .. }
                | EngineError::UnknownLineItem(_)
                | EngineError::NotFound { .. }
                | EngineError::InvalidPeriod(_)
                | EngineError::CsvDataFormatError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_mismatch_message() {
        let err = EngineError::project_mismatch("measurement 3", 1, 2);
        assert_eq!(
            err.to_string(),
            "Project mismatch: measurement 3 belongs to project 2, expected project 1"
        );
        assert!(err.is_input_error());
    }

    #[test]
    fn test_io_error_is_not_input_error() {
        let err: EngineError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.to_string().contains("I/O error"));
        assert!(!err.is_input_error());
    }
}
