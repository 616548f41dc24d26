//! Error types for annotask.
//!
//! Every error is fatal: nothing is retried or skipped. The binary reports
//! the error and exits with a non-zero code.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for publishing and aggregation.
#[derive(Debug, Error)]
pub enum AnnotaskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot read question file '{path}': {reason}")]
    QuestionFile { path: PathBuf, reason: String },

    #[error("Task service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Malformed response data: {0}")]
    DataFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by the task-hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("response missing field '{0}'")]
    IncompleteResponse(&'static str),
}

/// Result type alias for annotask operations
pub type Result<T> = std::result::Result<T, AnnotaskError>;

impl AnnotaskError {
    /// Returns true for errors caused by malformed trial data.
    pub fn is_data_format(&self) -> bool {
        matches!(self, AnnotaskError::DataFormat(_))
    }

    /// Returns true for missing or invalid local configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            AnnotaskError::Config(_) | AnnotaskError::QuestionFile { .. }
        )
    }
}

impl From<serde_json::Error> for AnnotaskError {
    fn from(err: serde_json::Error) -> Self {
        AnnotaskError::DataFormat(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(AnnotaskError::DataFormat("x".into()).is_data_format());
        assert!(AnnotaskError::Config("x".into()).is_config());
        assert!(AnnotaskError::QuestionFile {
            path: PathBuf::from("q.xml"),
            reason: "missing".into()
        }
        .is_config());
        assert!(!AnnotaskError::Service(ServiceError::Rejected("denied".into())).is_config());
    }

    #[test]
    fn test_json_error_is_data_format() {
        let err = serde_json::from_str::<Vec<u32>>("{not json").unwrap_err();
        assert!(AnnotaskError::from(err).is_data_format());
    }

    #[test]
    fn test_service_error_display() {
        let err = AnnotaskError::from(ServiceError::IncompleteResponse("HITId"));
        assert_eq!(
            err.to_string(),
            "Task service error: response missing field 'HITId'"
        );
    }
}
