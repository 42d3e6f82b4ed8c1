//! Download worker metrics.
//!
//! Recorded through the `metrics` facade; the API process installs the
//! Prometheus recorder that renders them.

use metrics::{counter, gauge, histogram};

pub mod names {
    pub const DOWNLOADS_ACTIVE: &str = "vfetch_downloads_active";
    pub const JOBS_COMPLETED_TOTAL: &str = "vfetch_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vfetch_jobs_failed_total";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "vfetch_download_duration_seconds";
    pub const FILES_DOWNLOADED_TOTAL: &str = "vfetch_files_downloaded_total";
}

/// Track a tool invocation starting or finishing.
pub fn download_started() {
    gauge!(names::DOWNLOADS_ACTIVE).increment(1.0);
}

pub fn download_finished(duration_secs: f64) {
    gauge!(names::DOWNLOADS_ACTIVE).decrement(1.0);
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_completed(files: usize) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    counter!(names::FILES_DOWNLOADED_TOTAL).increment(files as u64);
}

/// `reason` is "permanent" or "transient".
pub fn record_job_failed(reason: &'static str) {
    counter!(names::JOBS_FAILED_TOTAL, "reason" => reason).increment(1);
}
