//! yt-dlp CLI wrapper for fetching media.
//!
//! This crate provides:
//! - Type-safe yt-dlp command building from service configuration
//! - Progress parsing from a machine-readable progress template
//! - Metadata extraction from yt-dlp's info JSON
//! - Filename sanitization and collection of produced files
//! - The `MediaDownloader` seam used by the download worker

pub mod command;
pub mod download;
pub mod error;
pub mod fs_utils;
pub mod info;
pub mod progress;
pub mod sanitize;

pub use command::{ExtractorArgs, YtDlpCommand, YtDlpOptions};
pub use download::{describe_failure, DownloadOutcome, FailureKind, MediaDownloader, YtDlp};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{collect_outputs, move_file};
pub use info::{parse_info_json, read_info_json};
pub use progress::{DownloadProgress, ProgressCallback};
pub use sanitize::{is_safe_component, sanitize_filename};
