//! Download lifecycle log events.
//!
//! Each event is a fixed message with the facts as fields (`job_id`,
//! `url`, `file_count`, `failure`, ...), so JSON logs can be filtered
//! without parsing message text.

use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, error, info, warn, Span};
use vfetch_models::JobId;

use crate::error::WorkerError;

/// Log events for one download job.
#[derive(Debug, Clone)]
pub struct DownloadLog {
    job_id: JobId,
}

impl DownloadLog {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.clone(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Span wrapping the whole job, so tool and storage logs inherit the id.
    pub fn span(&self) -> Span {
        tracing::info_span!("download_job", job_id = %self.job_id)
    }

    /// The job got a download slot after waiting `queued`.
    pub fn started(&self, url: &str, queued: Duration) {
        info!(
            job_id = %self.job_id,
            url = %url,
            queued_ms = queued.as_millis() as u64,
            "Download started"
        );
    }

    pub fn progress(&self, percent: u8) {
        debug!(job_id = %self.job_id, progress = percent, "Download progress");
    }

    pub fn progress_not_recorded(&self, percent: u8, err: &dyn Display) {
        warn!(
            job_id = %self.job_id,
            progress = percent,
            error = %err,
            "Failed to record download progress"
        );
    }

    pub fn completed(&self, files: &[String], elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            file_count = files.len(),
            files = ?files,
            elapsed_ms = elapsed.as_millis() as u64,
            "Download completed"
        );
    }

    /// Permanent failures are the video's fault and logged as warnings.
    pub fn failed(&self, err: &WorkerError, elapsed: Duration) {
        let kind = err.failure_kind().map(|k| format!("{:?}", k));
        if err.is_permanent_failure() {
            warn!(
                job_id = %self.job_id,
                failure = err.failure_class(),
                kind = ?kind,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %err,
                "Download failed"
            );
        } else {
            error!(
                job_id = %self.job_id,
                failure = err.failure_class(),
                kind = ?kind,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %err,
                "Download failed"
            );
        }
    }

    /// The failure itself could not be written to the record.
    pub fn failure_not_recorded(&self, err: &dyn Display) {
        error!(job_id = %self.job_id, error = %err, "Failed to record download failure");
    }

    pub fn scratch_not_removed(&self, dir: &Path, err: &std::io::Error) {
        warn!(
            job_id = %self.job_id,
            dir = %dir.display(),
            error = %err,
            "Failed to remove scratch directory"
        );
    }
}
