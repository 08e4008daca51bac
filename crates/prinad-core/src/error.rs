use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrinadError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("PD estimator not ready: {0}")]
    NotReady(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("PD estimator failure: {0}")]
    EstimatorFailure(String),

    #[error("Explanation unavailable: {0}")]
    ExplanationUnavailable(String),

    #[error("No prior write-off registered for contract '{0}'")]
    NoPriorWriteOff(String),

    #[error("Contract not found: {0}")]
    ContractNotFound(String),

    #[error("Contract already exists: {0}")]
    ContractAlreadyExists(String),

    #[error("Contract '{0}' has been written off and is no longer staged")]
    ContractWrittenOff(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PrinadError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        PrinadError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for PrinadError {
    fn from(e: serde_json::Error) -> Self {
        PrinadError::SerializationError(e.to_string())
    }
}
