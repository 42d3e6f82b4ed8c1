//! Worker error types.

use thiserror::Error;
use vfetch_media::{FailureKind, MediaError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to acquire download slot")]
    SlotUnavailable,

    #[error("Storage error: {0}")]
    Storage(#[from] vfetch_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Message recorded on the failed job.
    ///
    /// Tool failures are classified into something a user can act on;
    /// everything else is reported as-is.
    pub fn user_message(&self) -> String {
        match self {
            WorkerError::Media(MediaError::DownloadFailed { message }) => {
                vfetch_media::describe_failure(message)
            }
            WorkerError::Media(e) => e.to_string(),
            other => other.to_string(),
        }
    }

    /// Class of tool failure, when the tool reported one.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            WorkerError::Media(MediaError::DownloadFailed { message }) => {
                FailureKind::classify(message)
            }
            _ => None,
        }
    }

    /// Check if this is a permanent failure that retrying will not fix.
    ///
    /// The video itself is inaccessible (private, removed, age or region
    /// restricted) or the site is not supported at all.
    pub fn is_permanent_failure(&self) -> bool {
        self.failure_kind().is_some_and(FailureKind::is_permanent)
    }

    /// Label for failure metrics and logs.
    pub fn failure_class(&self) -> &'static str {
        if self.is_permanent_failure() {
            "permanent"
        } else {
            "transient"
        }
    }
}
