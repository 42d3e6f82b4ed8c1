//! Worker configuration.

use std::path::PathBuf;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent tool invocations
    pub max_concurrent_downloads: usize,
    /// Parent directory for per-job scratch directories
    pub work_dir: PathBuf,
    /// Minimum whole-percent change before progress is written back
    pub progress_step: u8,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 2,
            work_dir: default_work_dir(),
            progress_step: 5,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_downloads: std::env::var("WORKER_MAX_DOWNLOADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(2),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_work_dir()),
            progress_step: std::env::var("WORKER_PROGRESS_STEP")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| (1..=100).contains(n))
                .unwrap_or(5),
        }
    }
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("vfetch")
}
