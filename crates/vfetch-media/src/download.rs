//! Media download using yt-dlp.
//!
//! The download worker only sees the [`MediaDownloader`] trait; [`YtDlp`] is
//! the production implementation that shells out to the yt-dlp binary.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use vfetch_models::MediaMetadata;

use crate::command::{YtDlpCommand, YtDlpOptions};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::is_scratch_file;
use crate::info::read_info_json;
use crate::progress::{parse_progress_line, ProgressCallback};

/// Number of trailing stderr lines kept for error reporting.
const STDERR_TAIL_LINES: usize = 40;

/// Suffix of the metadata document yt-dlp writes with `--write-info-json`.
const INFO_JSON_SUFFIX: &str = ".info.json";

/// Result of a successful tool invocation.
#[derive(Debug, Clone, Default)]
pub struct DownloadOutcome {
    /// Media files left in the work directory, in name order
    pub files: Vec<PathBuf>,
    /// Metadata reported by the tool, if any
    pub metadata: Option<MediaMetadata>,
}

/// Fetches media for a URL into a scratch directory.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download `url` into `work_dir`, reporting progress as it goes.
    ///
    /// The work directory exists and is empty when this is called. An
    /// implementation must not return `Ok` without at least one file.
    async fn download(
        &self,
        url: &str,
        work_dir: &Path,
        on_progress: ProgressCallback,
    ) -> MediaResult<DownloadOutcome>;

    /// Check that the underlying tool can be run.
    fn check_available(&self) -> MediaResult<()> {
        Ok(())
    }
}

/// yt-dlp backed downloader.
#[derive(Debug, Clone, Default)]
pub struct YtDlp {
    options: YtDlpOptions,
}

impl YtDlp {
    pub fn new(options: YtDlpOptions) -> Self {
        Self { options }
    }

    pub fn from_env() -> Self {
        Self::new(YtDlpOptions::from_env())
    }

    pub fn options(&self) -> &YtDlpOptions {
        &self.options
    }

    fn resolve_binary(&self) -> MediaResult<PathBuf> {
        which::which(&self.options.binary)
            .map_err(|e| MediaError::YtDlpNotFound(format!("{}: {}", self.options.binary, e)))
    }
}

#[async_trait]
impl MediaDownloader for YtDlp {
    async fn download(
        &self,
        url: &str,
        work_dir: &Path,
        on_progress: ProgressCallback,
    ) -> MediaResult<DownloadOutcome> {
        let binary = self.resolve_binary()?;
        let cmd = YtDlpCommand::new(url, work_dir, self.options.clone());
        let args = cmd.build_args();

        info!(url = %url, work_dir = %work_dir.display(), "Starting yt-dlp download");
        debug!("Running yt-dlp: {} {}", binary.display(), args.join(" "));

        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::download_failed("yt-dlp stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::download_failed("yt-dlp stderr not captured"))?;

        let read_stdout = for_each_line(stdout, |line| match parse_progress_line(&line) {
            Some(progress) => on_progress(progress),
            None => debug!(target: "vfetch_media::ytdlp", "{}", line),
        });

        let read_stderr = async {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            for_each_line(stderr, |line| {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            })
            .await;
            tail
        };

        let (_, stderr_tail, status) = tokio::join!(read_stdout, read_stderr, child.wait());
        let status = status?;

        if !status.success() {
            let message = last_error_line(stderr_tail.iter().map(String::as_str))
                .unwrap_or_else(|| format!("yt-dlp exited with {}", status));
            warn!(url = %url, exit_code = ?status.code(), "yt-dlp failed: {}", message);
            return Err(MediaError::download_failed(message));
        }

        let outcome = scan_work_dir(work_dir).await?;
        if outcome.files.is_empty() {
            return Err(MediaError::NoOutput);
        }

        info!(
            url = %url,
            files = outcome.files.len(),
            "yt-dlp download finished"
        );

        Ok(outcome)
    }

    fn check_available(&self) -> MediaResult<()> {
        self.resolve_binary().map(|_| ())
    }
}

/// Feed every line of `reader` to `on_line` until EOF.
///
/// yt-dlp echoes titles and file names in whatever encoding the site used,
/// so lines are decoded lossily. The pipe has to be read to the end or the
/// tool dies on its next write.
async fn for_each_line<R>(reader: R, mut on_line: impl FnMut(String))
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(&['\n', '\r'][..]).to_string());
            }
            Err(e) => {
                warn!("Stopped reading yt-dlp output: {}", e);
                break;
            }
        }
    }
}

/// Split the work directory into media files and the info JSON document.
async fn scan_work_dir(work_dir: &Path) -> MediaResult<DownloadOutcome> {
    let mut files = Vec::new();
    let mut metadata = None;

    let mut entries = tokio::fs::read_dir(work_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if name.ends_with(INFO_JSON_SUFFIX) {
            match read_info_json(&path).await {
                Ok(meta) => metadata = Some(meta),
                Err(e) => warn!("Ignoring unreadable info JSON {}: {}", path.display(), e),
            }
            continue;
        }

        if is_scratch_file(&name) {
            continue;
        }

        files.push(path);
    }

    files.sort();
    Ok(DownloadOutcome { files, metadata })
}

/// Pick the most useful line from yt-dlp's stderr.
///
/// Prefers the last `ERROR:` line, falling back to the last non-empty line.
fn last_error_line<'a>(lines: impl DoubleEndedIterator<Item = &'a str> + Clone) -> Option<String> {
    let error_line = lines
        .clone()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("ERROR:"))
        .map(|line| line.trim_start_matches("ERROR:").trim().to_string());

    error_line.or_else(|| {
        lines
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    })
}

/// Known classes of yt-dlp failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unsupported,
    GeoBlocked,
    AgeRestricted,
    Private,
    Unavailable,
    RateLimited,
    NotStarted,
    Network,
}

impl FailureKind {
    /// Classify a tool error message. Unknown errors give `None`.
    pub fn classify(message: &str) -> Option<Self> {
        let msg = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| msg.contains(n));

        if has(&["unsupported url"]) {
            Some(Self::Unsupported)
        } else if has(&[
            "available in your country",
            "blocked in your country",
            "geo restrict",
            "geo-restrict",
        ]) {
            Some(Self::GeoBlocked)
        } else if has(&[
            "age-restricted",
            "age restricted",
            "age restriction",
            "age-gated",
            "age verification",
            "confirm your age",
        ]) {
            Some(Self::AgeRestricted)
        } else if has(&["private video", "video is private"]) {
            Some(Self::Private)
        } else if has(&[
            "video unavailable",
            "video is unavailable",
            "has been removed",
            "does not exist",
        ]) {
            Some(Self::Unavailable)
        } else if has(&["429", "too many requests"]) {
            Some(Self::RateLimited)
        } else if has(&["live event will begin", "premieres in"]) {
            Some(Self::NotStarted)
        } else if has(&[
            "unable to download webpage",
            "timed out",
            "connection refused",
            "connection reset",
            "name or service not known",
            "network is unreachable",
            "temporary failure in name resolution",
        ]) {
            Some(Self::Network)
        } else {
            None
        }
    }

    /// Plain explanation shown to users.
    pub fn summary(self) -> &'static str {
        match self {
            Self::Unsupported => "This site or URL is not supported",
            Self::GeoBlocked => "The video is not available in this server's region",
            Self::AgeRestricted => "The video is age-restricted and needs an authenticated session",
            Self::Private => "The video is private",
            Self::Unavailable => "The video is unavailable",
            Self::RateLimited => "The site is rate limiting downloads, try again later",
            Self::NotStarted => "The video has not started yet",
            Self::Network => "Network error while contacting the site",
        }
    }

    /// Retrying cannot fix these: the video itself is out of reach.
    pub fn is_permanent(self) -> bool {
        matches!(
            self,
            Self::Unsupported | Self::GeoBlocked | Self::AgeRestricted | Self::Private | Self::Unavailable
        )
    }
}

/// Turn a raw tool error into a message suitable for end users.
///
/// Known failure classes get a plain explanation; the tool's own text is
/// kept in parentheses.
pub fn describe_failure(message: &str) -> String {
    let detail = message.trim();

    match (FailureKind::classify(detail), detail.is_empty()) {
        (Some(kind), true) => kind.summary().to_string(),
        (Some(kind), false) => format!("{} ({})", kind.summary(), detail),
        (None, true) => "Download failed".to_string(),
        (None, false) => detail.to_string(),
    }
}
