//! Job lifecycle on top of the record store.

use std::path::PathBuf;
use tracing::{debug, info};

use vfetch_models::{validate_source_url, Job, JobId, JobUpdate};

use crate::error::{StorageError, StorageResult};
use crate::store::JobStore;

/// Creates, reads and updates job records.
///
/// Cheap to clone; every clone works on the same directory.
#[derive(Debug, Clone)]
pub struct JobTracker {
    store: JobStore,
}

impl JobTracker {
    pub fn new(store: JobStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Validate `url` and write a fresh pending record for it.
    ///
    /// Returns as soon as the record is on disk; scheduling the download is
    /// the caller's job.
    pub async fn create(&self, url: &str) -> StorageResult<Job> {
        let url = validate_source_url(url)?;
        let job = Job::new(url.as_str());

        self.store.write(&job).await?;
        info!(job_id = %job.id, url = %job.url, "Created download job");

        Ok(job)
    }

    /// Look up a job by its client-supplied id.
    ///
    /// Malformed, unknown and not-yet-written ids are all `NotFound`.
    pub async fn get_status(&self, raw_id: &str) -> StorageResult<Job> {
        let id = JobId::parse(raw_id).ok_or_else(|| StorageError::not_found(raw_id))?;
        self.store.read(&id).await
    }

    /// Merge `update` into the stored record and write it back.
    pub async fn update(&self, id: &JobId, update: JobUpdate) -> StorageResult<Job> {
        let mut job = self.store.read(id).await?;
        job.apply(update)?;
        self.store.write(&job).await?;

        debug!(
            job_id = %job.id,
            status = %job.status,
            progress = job.progress,
            "Updated job record"
        );
        Ok(job)
    }

    /// Resolve a downloadable file to its on-disk path.
    ///
    /// Only files listed in the job's record are served, whatever state the
    /// job is in. Anything else is `NotFound`.
    pub async fn resolve_artifact(&self, raw_id: &str, filename: &str) -> StorageResult<PathBuf> {
        let job = self.get_status(raw_id).await?;
        let path = self
            .store
            .artifact_path(&job.id, filename)
            .map_err(|_| StorageError::not_found(filename))?;

        if !job.owns_file(filename) {
            return Err(StorageError::not_found(filename));
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vfetch_models::JobStatus;

    fn tracker(dir: &TempDir) -> JobTracker {
        JobTracker::new(JobStore::new(dir.path()))
    }

    #[tokio::test]
    async fn test_create_writes_pending_record() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        let job = tracker.create("https://example.com/video1").await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.files.is_empty());

        let stored = tracker.get_status(job.id.as_str()).await.unwrap();
        assert_eq!(stored, job);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_urls() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        for bad in ["", "   ", "not a url", "ftp://example.com/file", "file:///etc/passwd"] {
            let err = tracker.create(bad).await.unwrap_err();
            assert!(matches!(err, StorageError::Validation(_)), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn test_create_allocates_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        let a = tracker.create("https://example.com/video1").await.unwrap();
        let b = tracker.create("https://example.com/video1").await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_get_status_not_found() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        assert!(tracker.get_status("nope").await.unwrap_err().is_not_found());
        assert!(tracker.get_status("../etc").await.unwrap_err().is_not_found());

        let job = tracker.create("https://example.com/video1").await.unwrap();
        let braced = format!("{{{}}}", job.id);
        assert!(tracker.get_status(&braced).await.unwrap_err().is_not_found());
        assert!(tracker
            .get_status(JobId::new().as_str())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_update_lifecycle() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        let job = tracker.create("https://example.com/video1").await.unwrap();

        let job = tracker.update(&job.id, JobUpdate::downloading()).await.unwrap();
        assert_eq!(job.status, JobStatus::Downloading);
        assert!(job.started_at.is_some());

        let job = tracker.update(&job.id, JobUpdate::progress(40)).await.unwrap();
        assert_eq!(job.progress, 40);

        let job = tracker
            .update(&job.id, JobUpdate::completed(vec!["video1.mp4".into()], None))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.files, vec!["video1.mp4"]);

        let stored = tracker.get_status(job.id.as_str()).await.unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_update_rejects_backward_transition() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        let job = tracker.create("https://example.com/video1").await.unwrap();
        tracker.update(&job.id, JobUpdate::downloading()).await.unwrap();
        tracker.update(&job.id, JobUpdate::failed("boom")).await.unwrap();

        let err = tracker
            .update(&job.id, JobUpdate::downloading())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidTransition { .. }));

        let stored = tracker.get_status(job.id.as_str()).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_update_unknown_job() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);

        let err = tracker
            .update(&JobId::new(), JobUpdate::downloading())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_resolve_artifact_only_serves_listed_files() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        let job = tracker.create("https://example.com/video1").await.unwrap();
        tracker.update(&job.id, JobUpdate::downloading()).await.unwrap();
        tracker
            .update(&job.id, JobUpdate::completed(vec!["video1.mp4".into()], None))
            .await
            .unwrap();

        let path = tracker
            .resolve_artifact(job.id.as_str(), "video1.mp4")
            .await
            .unwrap();
        assert_eq!(path, tracker.store().job_dir(&job.id).join("video1.mp4"));

        for bad in ["other.mp4", "job.json", "../job.json", "..", "a/video1.mp4"] {
            let err = tracker
                .resolve_artifact(job.id.as_str(), bad)
                .await
                .unwrap_err();
            assert!(matches!(err, StorageError::NotFound(_)), "{bad:?}");
        }

        let err = tracker
            .resolve_artifact(JobId::new().as_str(), "video1.mp4")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_resolve_artifact_pending_job_has_no_files() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        let job = tracker.create("https://example.com/video1").await.unwrap();

        assert!(tracker
            .resolve_artifact(job.id.as_str(), "video1.mp4")
            .await
            .unwrap_err()
            .is_not_found());
    }
}
