//! Error types for the prediction engine

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// A sequence or dataset with no elements was supplied
    #[error("Empty input: at least one time step is required")]
    EmptyInput,

    /// Matrix or vector shapes do not line up
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    /// Model configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected failure during a single prediction
    #[error("Prediction failed: {0}")]
    Prediction(String),

    /// A training sample or label could not be used
    #[error("Training sample failed: {0}")]
    Training(String),

    /// Non-finite feature values in a context that requires clean data
    #[error("Corrupt sample: {0}")]
    CorruptSample(String),

    /// The caller-supplied time budget was exceeded
    #[error("Time budget exceeded")]
    Timeout,

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration file could not be parsed or written
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary serialization/deserialization error
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn dimension(context: &'static str, expected: usize, found: usize) -> Self {
        Error::DimensionMismatch {
            context,
            expected,
            found,
        }
    }

    /// Configuration bugs that no retry will fix
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::EmptyInput | Error::DimensionMismatch { .. } | Error::InvalidConfig(_)
        )
    }

    /// Errors after which the same call may succeed later
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout | Error::Cancelled | Error::Training(_) | Error::CorruptSample(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::EmptyInput.is_fatal());
        assert!(Error::dimension("matmul", 3, 4).is_fatal());
        assert!(!Error::Timeout.is_fatal());
        assert!(Error::Timeout.is_recoverable());
        assert!(Error::Cancelled.is_recoverable());
        assert!(!Error::InvalidConfig("x".into()).is_recoverable());
    }

    #[test]
    fn test_dimension_message() {
        let err = Error::dimension("matmul", 3, 4);
        assert_eq!(
            err.to_string(),
            "Dimension mismatch in matmul: expected 3, found 4"
        );
    }
}
