//! Storage error types.

use thiserror::Error;

use vfetch_models::{JobStatus, ModelError};

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Unknown, malformed or not-yet-written job id, or a file the job
    /// does not own. Deliberately carries no detail for clients.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey(key.into())
    }

    /// True for every flavour of "no such job or file".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_) | StorageError::InvalidKey(_))
    }
}

impl From<ModelError> for StorageError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            other => Self::Validation(other.to_string()),
        }
    }
}
