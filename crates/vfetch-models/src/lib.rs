//! Shared data models for the vfetch download service.
//!
//! This crate provides Serde-serializable types for:
//! - Download jobs and their identifiers
//! - The job status state machine
//! - Media metadata harvested from the download tool
//! - Source URL validation

pub mod error;
pub mod job;
pub mod job_status;
pub mod metadata;
pub mod source_url;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use job::{Job, JobId, JobUpdate};
pub use job_status::JobStatus;
pub use metadata::MediaMetadata;
pub use source_url::{validate_source_url, MAX_URL_LENGTH};
