//! Download worker.
//!
//! Drives one job through pending -> downloading -> completed | failed. The
//! tool runs in a scratch directory under the configured work dir; produced
//! files are moved into the job's directory next to its record.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::fs;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::Instrument;

use vfetch_media::{collect_outputs, DownloadProgress, MediaDownloader, MediaError, ProgressCallback};
use vfetch_models::{Job, JobId, JobUpdate};
use vfetch_storage::{JobTracker, RECORD_FILE_NAME};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::DownloadLog;
use crate::metrics;

/// Highest progress written while a download is running; 100 is reserved
/// for completed jobs.
const MAX_RUNNING_PROGRESS: u8 = 99;

/// Runs download jobs in the background.
#[derive(Clone)]
pub struct DownloadWorker {
    tracker: JobTracker,
    downloader: Arc<dyn MediaDownloader>,
    config: WorkerConfig,
    download_semaphore: Arc<Semaphore>,
}

impl DownloadWorker {
    pub fn new(
        tracker: JobTracker,
        downloader: Arc<dyn MediaDownloader>,
        config: WorkerConfig,
    ) -> Self {
        let download_semaphore = Arc::new(Semaphore::new(config.max_concurrent_downloads));
        Self {
            tracker,
            downloader,
            config,
            download_semaphore,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn downloader(&self) -> &Arc<dyn MediaDownloader> {
        &self.downloader
    }

    /// Run a job on the runtime and return immediately.
    pub fn spawn(&self, id: JobId) -> JoinHandle<()> {
        let worker = self.clone();
        let span = DownloadLog::new(&id).span();

        tokio::spawn(
            async move {
                // Failures are already logged and, where possible, recorded
                let _ = worker.run(&id).await;
            }
            .instrument(span),
        )
    }

    /// Run a job to a terminal state.
    ///
    /// Returns the final record. An error means even the failure could not
    /// be written back.
    pub async fn run(&self, id: &JobId) -> WorkerResult<Job> {
        let log = DownloadLog::new(id);
        let submitted = Instant::now();

        match self.execute(id, &log).await {
            Ok(job) => {
                metrics::record_job_completed(job.files.len());
                log.completed(&job.files, submitted.elapsed());
                Ok(job)
            }
            Err(e) => {
                metrics::record_job_failed(e.failure_class());
                log.failed(&e, submitted.elapsed());

                self.tracker
                    .update(id, JobUpdate::failed(e.user_message()))
                    .await
                    .map_err(|update_err| {
                        log.failure_not_recorded(&update_err);
                        WorkerError::from(update_err)
                    })
            }
        }
    }

    async fn execute(&self, id: &JobId, log: &DownloadLog) -> WorkerResult<Job> {
        let queued = Instant::now();

        // Jobs waiting here stay pending
        let _permit = self
            .download_semaphore
            .acquire()
            .await
            .map_err(|_| WorkerError::SlotUnavailable)?;

        let job = self.tracker.update(id, JobUpdate::downloading()).await?;
        log.started(&job.url, queued.elapsed());

        let scratch = self.config.work_dir.join(id.as_str());
        let started = Instant::now();
        metrics::download_started();

        let result = self.download_into(&job, &scratch, log).await;

        metrics::download_finished(started.elapsed().as_secs_f64());
        if let Err(e) = fs::remove_dir_all(&scratch).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log.scratch_not_removed(&scratch, &e);
            }
        }

        result
    }

    async fn download_into(&self, job: &Job, scratch: &Path, log: &DownloadLog) -> WorkerResult<Job> {
        // Leftovers from an earlier run of the same id would be picked up as output
        let _ = fs::remove_dir_all(scratch).await;
        fs::create_dir_all(scratch).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let throttle = ProgressThrottle::new(self.config.progress_step);
        let on_progress: ProgressCallback = Box::new(move |progress: DownloadProgress| {
            if let Some(percent) = throttle.admit(progress.whole_percent()) {
                let _ = tx.send(percent);
            }
        });

        // The callback owns the sender, so the writer ends with the download
        let (outcome, ()) = tokio::join!(
            self.downloader.download(&job.url, scratch, on_progress),
            self.write_progress(&job.id, rx, log)
        );
        let outcome = outcome?;

        let job_dir = self.tracker.store().job_dir(&job.id);
        let files = collect_outputs(&outcome.files, &job_dir, &[RECORD_FILE_NAME]).await?;
        if files.is_empty() {
            return Err(MediaError::NoOutput.into());
        }

        Ok(self
            .tracker
            .update(&job.id, JobUpdate::completed(files, outcome.metadata))
            .await?)
    }

    async fn write_progress(&self, id: &JobId, mut rx: mpsc::UnboundedReceiver<u8>, log: &DownloadLog) {
        while let Some(percent) = rx.recv().await {
            match self.tracker.update(id, JobUpdate::progress(percent)).await {
                Ok(_) => log.progress(percent),
                Err(e) => log.progress_not_recorded(percent, &e),
            }
        }
    }
}

/// Drops progress reports that move less than `step` whole percent.
///
/// Reports only ever move forward and are capped below 100.
struct ProgressThrottle {
    step: u8,
    last: AtomicU8,
}

impl ProgressThrottle {
    fn new(step: u8) -> Self {
        Self {
            step: step.max(1),
            last: AtomicU8::new(0),
        }
    }

    fn admit(&self, percent: u8) -> Option<u8> {
        let percent = percent.min(MAX_RUNNING_PROGRESS);
        let step = self.step;

        self.last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                let moved = percent > last
                    && (percent >= last.saturating_add(step) || percent == MAX_RUNNING_PROGRESS);
                moved.then_some(percent)
            })
            .ok()
            .map(|_| percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use vfetch_media::{DownloadOutcome, MediaResult};
    use vfetch_models::{JobStatus, MediaMetadata};
    use vfetch_storage::JobStore;

    /// Stand-in for yt-dlp that writes canned files into the work dir.
    #[derive(Default)]
    struct FakeDownloader {
        files: Vec<(&'static str, &'static str)>,
        progress: Vec<f64>,
        error: Option<&'static str>,
        gate: Option<Arc<Semaphore>>,
        observer: Option<(JobTracker, Arc<Mutex<Vec<u8>>>)>,
    }

    #[async_trait]
    impl MediaDownloader for FakeDownloader {
        async fn download(
            &self,
            _url: &str,
            work_dir: &Path,
            on_progress: ProgressCallback,
        ) -> MediaResult<DownloadOutcome> {
            if let Some(gate) = &self.gate {
                let _open = gate.acquire().await;
            }

            for percent in &self.progress {
                on_progress(DownloadProgress {
                    percent: *percent,
                    ..Default::default()
                });
            }

            if let Some((tracker, seen)) = &self.observer {
                let id = work_dir.file_name().unwrap().to_string_lossy().to_string();
                for _ in 0..100 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    let job = tracker.get_status(&id).await.unwrap();
                    seen.lock().unwrap().push(job.progress);
                    if job.progress > 0 {
                        break;
                    }
                }
            }

            if let Some(message) = self.error {
                return Err(MediaError::download_failed(message));
            }

            let mut files = Vec::new();
            for (name, body) in &self.files {
                let path = work_dir.join(name);
                tokio::fs::write(&path, body).await?;
                files.push(path);
            }

            Ok(DownloadOutcome {
                files,
                metadata: Some(MediaMetadata {
                    title: Some("video1".into()),
                    ..Default::default()
                }),
            })
        }
    }

    struct Harness {
        _data: TempDir,
        _work: TempDir,
        tracker: JobTracker,
        config: WorkerConfig,
    }

    impl Harness {
        fn new(max_concurrent_downloads: usize) -> Self {
            let data = TempDir::new().unwrap();
            let work = TempDir::new().unwrap();
            let tracker = JobTracker::new(JobStore::new(data.path()));
            let config = WorkerConfig {
                max_concurrent_downloads,
                work_dir: work.path().to_path_buf(),
                progress_step: 5,
            };
            Self {
                _data: data,
                _work: work,
                tracker,
                config,
            }
        }

        fn worker(&self, downloader: FakeDownloader) -> DownloadWorker {
            DownloadWorker::new(self.tracker.clone(), Arc::new(downloader), self.config.clone())
        }

        async fn wait_for(&self, id: &JobId, status: JobStatus) -> Job {
            for _ in 0..200 {
                let job = self.tracker.get_status(id.as_str()).await.unwrap();
                if job.status == status {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("job {} never reached {}", id, status);
        }
    }

    #[tokio::test]
    async fn test_successful_download() {
        let h = Harness::new(2);
        let worker = h.worker(FakeDownloader {
            files: vec![("video1.mp4", "video bytes")],
            progress: vec![10.0, 50.0, 100.0],
            ..Default::default()
        });

        let job = h.tracker.create("https://example.com/video1").await.unwrap();
        let done = worker.run(&job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.files, vec!["video1.mp4"]);
        assert_eq!(done.progress, 100);
        assert!(done.error.is_none());
        assert_eq!(done.metadata.unwrap().title.as_deref(), Some("video1"));

        let path = h
            .tracker
            .resolve_artifact(job.id.as_str(), "video1.mp4")
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"video bytes");
        assert!(!h.config.work_dir.join(job.id.as_str()).exists());
    }

    #[tokio::test]
    async fn test_tool_failure_marks_job_failed() {
        let h = Harness::new(2);
        let worker = h.worker(FakeDownloader {
            error: Some("[youtube] abc: Private video. Sign in if you've been granted access"),
            ..Default::default()
        });

        let job = h.tracker.create("https://example.com/private").await.unwrap();
        let done = worker.run(&job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.files.is_empty());
        assert!(done.error.unwrap().starts_with("The video is private"));
        assert!(done.completed_at.is_some());
        assert!(!h.config.work_dir.join(job.id.as_str()).exists());
    }

    #[tokio::test]
    async fn test_zero_files_is_a_failure() {
        let h = Harness::new(2);
        let worker = h.worker(FakeDownloader::default());

        let job = h.tracker.create("https://example.com/empty").await.unwrap();
        let done = worker.run(&job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("No files were downloaded"));
    }

    #[tokio::test]
    async fn test_output_names_are_sanitized() {
        let h = Harness::new(2);
        let worker = h.worker(FakeDownloader {
            files: vec![("job.json", "not a record"), ("clip: part 1.mp4", "clip")],
            ..Default::default()
        });

        let job = h.tracker.create("https://example.com/clip").await.unwrap();
        let done = worker.run(&job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.files.len(), 2);
        assert!(!done.files.iter().any(|f| f == RECORD_FILE_NAME));
        // The record itself was not clobbered
        assert_eq!(
            h.tracker.get_status(job.id.as_str()).await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_progress_is_written_while_downloading() {
        let h = Harness::new(2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker = h.worker(FakeDownloader {
            files: vec![("video1.mp4", "v")],
            progress: vec![2.0, 42.0],
            observer: Some((h.tracker.clone(), seen.clone())),
            ..Default::default()
        });

        let job = h.tracker.create("https://example.com/video1").await.unwrap();
        worker.run(&job.id).await.unwrap();

        assert_eq!(seen.lock().unwrap().last().copied(), Some(42));
    }

    #[tokio::test]
    async fn test_concurrency_limit_keeps_jobs_pending() {
        let h = Harness::new(1);
        let gate = Arc::new(Semaphore::new(0));
        let worker = h.worker(FakeDownloader {
            files: vec![("video1.mp4", "v")],
            gate: Some(gate.clone()),
            ..Default::default()
        });

        let first = h.tracker.create("https://example.com/a").await.unwrap();
        let second = h.tracker.create("https://example.com/b").await.unwrap();

        let a = worker.spawn(first.id.clone());
        h.wait_for(&first.id, JobStatus::Downloading).await;
        let b = worker.spawn(second.id.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            h.tracker.get_status(second.id.as_str()).await.unwrap().status,
            JobStatus::Pending
        );

        gate.add_permits(2);
        a.await.unwrap();
        b.await.unwrap();

        h.wait_for(&first.id, JobStatus::Completed).await;
        h.wait_for(&second.id, JobStatus::Completed).await;
    }

    #[test]
    fn test_progress_throttle() {
        let throttle = ProgressThrottle::new(5);

        assert_eq!(throttle.admit(0), None);
        assert_eq!(throttle.admit(3), None);
        assert_eq!(throttle.admit(5), Some(5));
        assert_eq!(throttle.admit(9), None);
        assert_eq!(throttle.admit(12), Some(12));
        // A second file restarts at zero; progress never goes back
        assert_eq!(throttle.admit(4), None);
        assert_eq!(throttle.admit(96), Some(96));
        assert_eq!(throttle.admit(100), Some(99));
        assert_eq!(throttle.admit(100), None);
    }
}
