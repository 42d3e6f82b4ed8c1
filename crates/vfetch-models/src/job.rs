//! Download job records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::{JobStatus, MediaMetadata};

/// Length of `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
const HYPHENATED_LEN: usize = 36;

/// Unique identifier for a job.
///
/// The id doubles as the capability for reading the job's status and
/// files, so it is always a random v4 UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a client-supplied id.
    ///
    /// Only the 36-character hyphenated form is accepted (hex digits in
    /// either case). Braced, `urn:uuid:` and simple spellings are rejected,
    /// so a malformed id never reaches the filesystem.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != HYPHENATED_LEN {
            return None;
        }
        Uuid::try_parse(s)
            .ok()
            .map(|uuid| Self(uuid.hyphenated().to_string()))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A download job and everything clients may learn about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Submitted source URL
    pub url: String,

    /// Current lifecycle state
    #[serde(default)]
    pub status: JobStatus,

    /// Names of produced files inside the job directory
    #[serde(default)]
    pub files: Vec<String>,

    /// Human-readable failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Download progress (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Metadata reported by the download tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MediaMetadata>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// When the worker began downloading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job for a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_id(JobId::new(), url)
    }

    /// Create a new pending job with a caller-chosen id.
    pub fn with_id(id: JobId, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            url: url.into(),
            status: JobStatus::Pending,
            files: Vec::new(),
            error: None,
            progress: 0,
            metadata: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check whether `name` is one of the files this job produced.
    pub fn owns_file(&self, name: &str) -> bool {
        self.files.iter().any(|f| f == name)
    }

    /// Merge a partial update into the record.
    ///
    /// The whole update is rejected, leaving the job untouched, when its
    /// status would move the lifecycle backwards.
    pub fn apply(&mut self, update: JobUpdate) -> ModelResult<()> {
        if let Some(next) = update.status {
            if !self.status.can_transition_to(next) {
                return Err(ModelError::InvalidTransition {
                    from: self.status,
                    to: next,
                });
            }
        }

        let now = Utc::now();

        if let Some(next) = update.status {
            if next != self.status {
                if next == JobStatus::Downloading {
                    self.started_at = Some(now);
                }
                if next.is_terminal() {
                    self.completed_at = Some(now);
                }
            }
            self.status = next;
        }
        if let Some(files) = update.files {
            self.files = files;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(metadata) = update.metadata {
            self.metadata = Some(metadata);
        }
        if self.status == JobStatus::Completed {
            self.progress = 100;
        }

        self.updated_at = now;
        Ok(())
    }
}

/// Partial job record merged by [`Job::apply`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MediaMetadata>,
}

impl JobUpdate {
    /// Move the job into the downloading state.
    pub fn downloading() -> Self {
        Self {
            status: Some(JobStatus::Downloading),
            progress: Some(0),
            ..Default::default()
        }
    }

    /// Record download progress.
    pub fn progress(percent: u8) -> Self {
        Self {
            progress: Some(percent),
            ..Default::default()
        }
    }

    /// Finish the job with its produced files.
    pub fn completed(files: Vec<String>, metadata: Option<MediaMetadata>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            files: Some(files),
            metadata,
            ..Default::default()
        }
    }

    /// Finish the job with a failure reason.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
