//! yt-dlp command builder.

use std::path::{Path, PathBuf};

use crate::progress::PROGRESS_TEMPLATE;

/// Output template used inside a job's scratch directory.
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Default format selector.
pub const DEFAULT_FORMAT: &str = "best";

/// Per-site extractor arguments, e.g. `youtube:player_client=android,web`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorArgs {
    pub site: String,
    pub key: String,
    pub values: Vec<String>,
}

impl ExtractorArgs {
    /// Parse a `;`-separated list of `site:key=v1,v2` entries.
    ///
    /// Malformed entries are skipped.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(';')
            .filter_map(|entry| {
                let (site, rest) = entry.trim().split_once(':')?;
                let (key, values) = rest.split_once('=')?;
                let values: Vec<String> = values
                    .split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                if site.trim().is_empty() || key.trim().is_empty() || values.is_empty() {
                    return None;
                }
                Some(Self {
                    site: site.trim().to_string(),
                    key: key.trim().to_string(),
                    values,
                })
            })
            .collect()
    }

    /// Render as the value of `--extractor-args`.
    pub fn to_arg(&self) -> String {
        format!("{}:{}={}", self.site, self.key, self.values.join(","))
    }
}

/// Operator-tunable yt-dlp options.
#[derive(Debug, Clone)]
pub struct YtDlpOptions {
    /// Binary name or path
    pub binary: String,
    /// Format selector
    pub format: String,
    /// Netscape cookies file
    pub cookies_file: Option<PathBuf>,
    /// Per-site extractor arguments
    pub extractor_args: Vec<ExtractorArgs>,
    /// Retries for HTTP errors
    pub retries: Option<u32>,
    /// Retries per fragment
    pub fragment_retries: Option<u32>,
    /// Socket timeout in seconds
    pub socket_timeout: Option<u32>,
    /// Rate limit passed verbatim (e.g. `1M`)
    pub rate_limit: Option<String>,
    /// Seconds to sleep before each download
    pub sleep_interval: Option<u32>,
    /// Additional raw arguments
    pub extra_args: Vec<String>,
}

impl Default for YtDlpOptions {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            format: DEFAULT_FORMAT.to_string(),
            cookies_file: None,
            extractor_args: Vec::new(),
            retries: None,
            fragment_retries: None,
            socket_timeout: None,
            rate_limit: None,
            sleep_interval: None,
            extra_args: Vec::new(),
        }
    }
}

impl YtDlpOptions {
    /// Create options from environment variables.
    pub fn from_env() -> Self {
        Self {
            binary: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            format: std::env::var("YTDLP_FORMAT").unwrap_or_else(|_| DEFAULT_FORMAT.to_string()),
            cookies_file: std::env::var("YTDLP_COOKIES_FILE").ok().map(PathBuf::from),
            extractor_args: std::env::var("YTDLP_EXTRACTOR_ARGS")
                .map(|s| ExtractorArgs::parse_list(&s))
                .unwrap_or_default(),
            retries: std::env::var("YTDLP_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok()),
            fragment_retries: std::env::var("YTDLP_FRAGMENT_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok()),
            socket_timeout: std::env::var("YTDLP_SOCKET_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok()),
            rate_limit: std::env::var("YTDLP_RATE_LIMIT").ok().filter(|s| !s.is_empty()),
            sleep_interval: std::env::var("YTDLP_SLEEP_INTERVAL")
                .ok()
                .and_then(|s| s.parse().ok()),
            extra_args: std::env::var("YTDLP_EXTRA_ARGS")
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
        }
    }
}

/// Builder for a single yt-dlp invocation.
#[derive(Debug, Clone)]
pub struct YtDlpCommand {
    url: String,
    work_dir: PathBuf,
    options: YtDlpOptions,
}

impl YtDlpCommand {
    /// Create a command that downloads `url` into `work_dir`.
    pub fn new(url: impl Into<String>, work_dir: impl AsRef<Path>, options: YtDlpOptions) -> Self {
        Self {
            url: url.into(),
            work_dir: work_dir.as_ref().to_path_buf(),
            options,
        }
    }

    /// Binary to execute.
    pub fn binary(&self) -> &str {
        &self.options.binary
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let opts = &self.options;
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-color".to_string(),
            "--newline".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--write-info-json".to_string(),
            "-f".to_string(),
            opts.format.clone(),
            "-P".to_string(),
            self.work_dir.to_string_lossy().to_string(),
            "-o".to_string(),
            OUTPUT_TEMPLATE.to_string(),
        ];

        if let Some(cookies) = &opts.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().to_string());
        }
        for extractor in &opts.extractor_args {
            args.push("--extractor-args".to_string());
            args.push(extractor.to_arg());
        }
        if let Some(retries) = opts.retries {
            args.push("--retries".to_string());
            args.push(retries.to_string());
        }
        if let Some(retries) = opts.fragment_retries {
            args.push("--fragment-retries".to_string());
            args.push(retries.to_string());
        }
        if let Some(timeout) = opts.socket_timeout {
            args.push("--socket-timeout".to_string());
            args.push(timeout.to_string());
        }
        if let Some(rate) = &opts.rate_limit {
            args.push("--limit-rate".to_string());
            args.push(rate.clone());
        }
        if let Some(sleep) = opts.sleep_interval {
            args.push("--sleep-interval".to_string());
            args.push(sleep.to_string());
        }
        args.extend(opts.extra_args.iter().cloned());

        // URL goes last, after "--" so it is never read as an option
        args.push("--".to_string());
        args.push(self.url.clone());

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let cmd = YtDlpCommand::new(
            "https://example.com/video1",
            "/tmp/work",
            YtDlpOptions::default(),
        );
        let args = cmd.build_args();

        assert_eq!(cmd.binary(), "yt-dlp");
        assert!(args.windows(2).any(|w| w == ["-f", "best"]));
        assert!(args.windows(2).any(|w| w == ["-P", "/tmp/work"]));
        assert!(args.windows(2).any(|w| w == ["-o", OUTPUT_TEMPLATE]));
        assert!(args.contains(&"--write-info-json".to_string()));
        assert_eq!(
            &args[args.len() - 2..],
            ["--", "https://example.com/video1"]
        );
        assert!(!args.contains(&"--cookies".to_string()));
    }

    #[test]
    fn test_optional_args() {
        let options = YtDlpOptions {
            format: "bestvideo+bestaudio/best".into(),
            cookies_file: Some(PathBuf::from("/app/cookies.txt")),
            extractor_args: ExtractorArgs::parse_list("somesite:player_client=android,web"),
            retries: Some(3),
            fragment_retries: Some(3),
            socket_timeout: Some(30),
            rate_limit: Some("1M".into()),
            sleep_interval: Some(5),
            extra_args: vec!["--no-mtime".into()],
            ..Default::default()
        };
        let args = YtDlpCommand::new("https://example.com/v", "/w", options).build_args();

        assert!(args.windows(2).any(|w| w == ["--cookies", "/app/cookies.txt"]));
        assert!(args
            .windows(2)
            .any(|w| w == ["--extractor-args", "somesite:player_client=android,web"]));
        assert!(args.windows(2).any(|w| w == ["--retries", "3"]));
        assert!(args.windows(2).any(|w| w == ["--fragment-retries", "3"]));
        assert!(args.windows(2).any(|w| w == ["--socket-timeout", "30"]));
        assert!(args.windows(2).any(|w| w == ["--limit-rate", "1M"]));
        assert!(args.windows(2).any(|w| w == ["--sleep-interval", "5"]));
        assert!(args.contains(&"--no-mtime".to_string()));
    }

    #[test]
    fn test_parse_extractor_args() {
        let parsed = ExtractorArgs::parse_list("somesite:skip=hls,dash; other:api=graphql;broken;x:=y");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].to_arg(), "somesite:skip=hls,dash");
        assert_eq!(parsed[1].site, "other");
        assert_eq!(parsed[1].values, vec!["graphql"]);
    }
}
