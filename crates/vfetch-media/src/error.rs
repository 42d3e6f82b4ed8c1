//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while fetching media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("yt-dlp not found: {0}")]
    YtDlpNotFound(String),

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    #[error("No files were downloaded")]
    NoOutput,

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a download failure error.
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }
}
