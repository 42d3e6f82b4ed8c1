//! yt-dlp progress parsing.

use serde::{Deserialize, Serialize};

/// Prefix emitted by the progress template passed to yt-dlp.
pub const PROGRESS_PREFIX: &str = "vfetch-progress:";

/// Progress template handed to `--progress-template`.
///
/// Produces lines such as `vfetch-progress: 42.3%|1048576|5242880`.
pub const PROGRESS_TEMPLATE: &str =
    "download:vfetch-progress:%(progress._percent_str)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s";

/// Progress information from yt-dlp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Completion percentage of the current file (0.0-100.0)
    pub percent: f64,
    /// Bytes downloaded so far, when reported
    pub downloaded_bytes: Option<u64>,
    /// Total size, when known
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    /// Whole-number percentage clamped to 0-100.
    pub fn whole_percent(&self) -> u8 {
        self.percent.clamp(0.0, 100.0).floor() as u8
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(DownloadProgress) + Send + Sync + 'static>;

/// Parse one stdout line produced with [`PROGRESS_TEMPLATE`].
pub fn parse_progress_line(line: &str) -> Option<DownloadProgress> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut parts = rest.split('|');

    let percent = parts
        .next()?
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()?;

    let downloaded_bytes = parts.next().and_then(parse_bytes);
    let total_bytes = parts.next().and_then(parse_bytes);

    Some(DownloadProgress {
        percent,
        downloaded_bytes,
        total_bytes,
    })
}

/// yt-dlp prints `NA` for unknown values and sometimes floats for byte counts.
fn parse_bytes(value: &str) -> Option<u64> {
    let value = value.trim();
    value
        .parse::<u64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|v| v as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_line() {
        let progress = parse_progress_line("vfetch-progress: 42.3%|1048576|5242880").unwrap();
        assert!((progress.percent - 42.3).abs() < f64::EPSILON);
        assert_eq!(progress.downloaded_bytes, Some(1_048_576));
        assert_eq!(progress.total_bytes, Some(5_242_880));
        assert_eq!(progress.whole_percent(), 42);
    }

    #[test]
    fn test_parse_unknown_totals() {
        let progress = parse_progress_line("vfetch-progress:100.0%|2000.0|NA").unwrap();
        assert_eq!(progress.whole_percent(), 100);
        assert_eq!(progress.downloaded_bytes, Some(2000));
        assert_eq!(progress.total_bytes, None);
    }

    #[test]
    fn test_ignores_other_output() {
        assert!(parse_progress_line("[youtube] abc: Downloading webpage").is_none());
        assert!(parse_progress_line("vfetch-progress:  N/A|NA|NA").is_none());
        assert!(parse_progress_line("").is_none());
    }
}
