//! File-backed job records.
//!
//! This crate provides:
//! - `JobStore`: one JSON document per job on disk, written atomically
//! - `JobTracker`: job creation, status lookup and partial updates
//! - Artifact path resolution that only serves files a job recorded

pub mod error;
pub mod store;
pub mod tracker;

pub use error::{StorageError, StorageResult};
pub use store::{JobStore, RECORD_FILE_NAME};
pub use tracker::JobTracker;
