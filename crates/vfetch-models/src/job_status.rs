//! Download job status.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a download job.
///
/// Transitions only move forward: `pending -> downloading -> completed | failed`.
/// A pending job may also fail directly when the worker cannot start it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is recorded and waiting for the worker
    #[default]
    Pending,
    /// External tool is running
    Downloading,
    /// Files are available for fetching
    Completed,
    /// Download failed, see the job's error field
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Check whether moving from `self` to `next` keeps the lifecycle monotonic.
    ///
    /// Re-writing the current status is allowed so that updates which only
    /// touch other fields can carry the status along.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if *self == next {
            return true;
        }

        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Downloading)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Downloading, JobStatus::Completed)
                | (JobStatus::Downloading, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
