//! Background download worker.
//!
//! This crate provides:
//! - `DownloadWorker`: runs one job from pending to a terminal state
//! - Bounded concurrency for tool invocations
//! - Throttled progress write-back
//! - Structured per-job logging and download metrics

pub mod config;
pub mod download;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::WorkerConfig;
pub use download::DownloadWorker;
pub use error::{WorkerError, WorkerResult};
pub use logging::DownloadLog;
