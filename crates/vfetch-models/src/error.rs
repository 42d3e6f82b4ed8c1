//! Model-level error types.

use thiserror::Error;

use crate::JobStatus;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("URL is required")]
    MissingUrl,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

impl ModelError {
    pub fn invalid_url(reason: impl Into<String>) -> Self {
        Self::InvalidUrl(reason.into())
    }
}
