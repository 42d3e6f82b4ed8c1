//! Validation of user-submitted source URLs.
//!
//! Only the shape of the URL is checked here. Whether the download tool
//! supports the site is discovered when the job runs.

use url::Url;

use crate::error::{ModelError, ModelResult};

/// Longest URL accepted at submission time.
pub const MAX_URL_LENGTH: usize = 2048;

/// Validate a submitted URL and return it parsed.
///
/// Rejects empty input, overly long input, anything that does not parse,
/// non-HTTP(S) schemes and URLs without a host.
pub fn validate_source_url(raw: &str) -> ModelResult<Url> {
    let raw = raw.trim();

    if raw.is_empty() {
        return Err(ModelError::MissingUrl);
    }

    if raw.len() > MAX_URL_LENGTH {
        return Err(ModelError::invalid_url(format!(
            "URL exceeds {} characters",
            MAX_URL_LENGTH
        )));
    }

    let url = Url::parse(raw).map_err(|e| ModelError::invalid_url(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ModelError::invalid_url(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(ModelError::invalid_url("URL has no host")),
    }
}
