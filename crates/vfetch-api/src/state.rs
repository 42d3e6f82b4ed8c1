//! Application state.

use std::sync::Arc;

use vfetch_media::YtDlp;
use vfetch_storage::{JobStore, JobTracker};
use vfetch_worker::{DownloadWorker, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub tracker: JobTracker,
    pub worker: DownloadWorker,
}

impl AppState {
    /// Create application state from the environment.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = JobStore::new(&config.downloads_dir);
        store.ensure_root().await?;
        let tracker = JobTracker::new(store);

        let worker_config = WorkerConfig::from_env();
        tokio::fs::create_dir_all(&worker_config.work_dir).await?;

        let worker = DownloadWorker::new(tracker.clone(), Arc::new(YtDlp::from_env()), worker_config);

        Ok(Self::with_parts(config, tracker, worker))
    }

    /// Assemble state from already-built parts.
    pub fn with_parts(config: ApiConfig, tracker: JobTracker, worker: DownloadWorker) -> Self {
        Self {
            config,
            tracker,
            worker,
        }
    }
}
