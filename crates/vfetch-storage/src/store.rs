//! Job record store.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<job-id>/job.json      status document
//! <root>/<job-id>/<artifact>    downloaded files
//! ```
//!
//! The store is pure read/write; lifecycle rules live in the tracker.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use vfetch_media::is_safe_component;
use vfetch_models::{Job, JobId};

use crate::error::{StorageError, StorageResult};

/// Name of the status document inside each job directory.
pub const RECORD_FILE_NAME: &str = "job.json";

/// Marker written by the readiness probe.
const PROBE_FILE_NAME: &str = ".vfetch-write-probe";

/// On-disk store holding one directory per job.
#[derive(Debug, Clone)]
pub struct JobStore {
    root: PathBuf,
}

impl JobStore {
    /// Create a store rooted at `root`. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if needed.
    pub async fn ensure_root(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Directory holding a job's record and artifacts.
    pub fn job_dir(&self, id: &JobId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn record_path(&self, id: &JobId) -> PathBuf {
        self.job_dir(id).join(RECORD_FILE_NAME)
    }

    /// Persist a job record.
    ///
    /// The document is written to a temp file in the job directory and
    /// renamed into place, so concurrent readers see either the old or the
    /// new record, never a partial one.
    pub async fn write(&self, job: &Job) -> StorageResult<()> {
        let dir = self.job_dir(&job.id);
        fs::create_dir_all(&dir).await?;

        let body = serde_json::to_vec_pretty(job)?;
        let tmp = dir.join(format!(".{}.{}.tmp", RECORD_FILE_NAME, Uuid::new_v4().simple()));

        fs::write(&tmp, &body).await?;
        if let Err(e) = fs::rename(&tmp, self.record_path(&job.id)).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(job_id = %job.id, status = %job.status, "Wrote job record");
        Ok(())
    }

    /// Load a job record.
    pub async fn read(&self, id: &JobId) -> StorageResult<Job> {
        let body = match fs::read(self.record_path(id)).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::not_found(id.as_str()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_slice(&body)?)
    }

    /// Check whether a record exists for `id`.
    pub async fn exists(&self, id: &JobId) -> bool {
        fs::try_exists(self.record_path(id)).await.unwrap_or(false)
    }

    /// Path of an artifact inside a job directory.
    ///
    /// Only single, normal path components are accepted, and the record
    /// document itself is never addressable as an artifact.
    pub fn artifact_path(&self, id: &JobId, filename: &str) -> StorageResult<PathBuf> {
        if !is_safe_component(filename) || filename == RECORD_FILE_NAME {
            return Err(StorageError::invalid_key(filename));
        }
        Ok(self.job_dir(id).join(filename))
    }

    /// Verify the root is writable by creating and removing a marker file.
    pub async fn check_writable(&self) -> StorageResult<()> {
        self.ensure_root().await?;
        let probe = self.root.join(PROBE_FILE_NAME);
        fs::write(&probe, b"ok").await?;
        fs::remove_file(&probe).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vfetch_models::{JobStatus, JobUpdate};

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::new(dir.path());

        let job = Job::new("https://example.com/video1");
        store.write(&job).await.unwrap();

        assert!(store.exists(&job.id).await);
        assert!(store.job_dir(&job.id).join(RECORD_FILE_NAME).exists());
        assert_eq!(store.read(&job.id).await.unwrap(), job);
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::new(dir.path());

        let mut job = Job::new("https://example.com/video1");
        store.write(&job).await.unwrap();
        job.apply(JobUpdate::downloading()).unwrap();
        store.write(&job).await.unwrap();

        assert_eq!(
            store.read(&job.id).await.unwrap().status,
            JobStatus::Downloading
        );

        let mut entries = fs::read_dir(store.job_dir(&job.id)).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec![RECORD_FILE_NAME.to_string()]);
    }

    #[tokio::test]
    async fn test_read_unknown_job() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::new(dir.path());

        let err = store.read(&JobId::new()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_job_dir_without_record_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::new(dir.path());
        let id = JobId::new();
        fs::create_dir_all(store.job_dir(&id)).await.unwrap();

        assert!(!store.exists(&id).await);
        assert!(store.read(&id).await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_artifact_path_rejects_traversal() {
        let store = JobStore::new("/data");
        let id = JobId::new();

        assert_eq!(
            store.artifact_path(&id, "video1.mp4").unwrap(),
            PathBuf::from("/data").join(id.as_str()).join("video1.mp4")
        );
        assert!(store.artifact_path(&id, "../secret").is_err());
        assert!(store.artifact_path(&id, "..").is_err());
        assert!(store.artifact_path(&id, "a/b.mp4").is_err());
        assert!(store.artifact_path(&id, "/etc/passwd").is_err());
        assert!(store.artifact_path(&id, RECORD_FILE_NAME).is_err());
    }

    #[tokio::test]
    async fn test_check_writable() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::new(dir.path().join("nested"));

        store.check_writable().await.unwrap();
        assert!(dir.path().join("nested").is_dir());
        assert!(!dir.path().join("nested").join(PROBE_FILE_NAME).exists());
    }
}
