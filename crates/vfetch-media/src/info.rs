//! yt-dlp info JSON parsing.

use serde::Deserialize;
use std::path::Path;

use vfetch_models::MediaMetadata;

use crate::error::{MediaError, MediaResult};

/// Subset of the `.info.json` document yt-dlp writes next to a download.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    uploader_id: Option<String>,
    channel: Option<String>,
    extractor_key: Option<String>,
    extractor: Option<String>,
    webpage_url: Option<String>,
    thumbnail: Option<String>,
    upload_date: Option<String>,
    view_count: Option<u64>,
    ext: Option<String>,
}

/// Parse the contents of an info JSON document into metadata.
pub fn parse_info_json(content: &str) -> MediaResult<MediaMetadata> {
    let info: YtDlpInfo = serde_json::from_str(content)?;

    Ok(MediaMetadata {
        title: info.title,
        duration: info.duration,
        uploader: info.uploader,
        uploader_id: info.uploader_id,
        channel: info.channel,
        extractor: info.extractor_key.or(info.extractor),
        webpage_url: info.webpage_url,
        thumbnail: info.thumbnail,
        upload_date: info.upload_date,
        view_count: info.view_count,
        ext: info.ext,
        media_id: info.id,
    })
}

/// Read and parse an info JSON file.
pub async fn read_info_json(path: impl AsRef<Path>) -> MediaResult<MediaMetadata> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_info_json(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typical_document() {
        let json = r#"{
            "id": "abc123def45",
            "title": "Video One",
            "duration": 212.0,
            "uploader": "Someone",
            "uploader_id": "@someone",
            "extractor": "youtube",
            "extractor_key": "Youtube",
            "webpage_url": "https://www.youtube.com/watch?v=abc123def45",
            "upload_date": "20240102",
            "view_count": 1234,
            "ext": "mp4",
            "formats": [{"format_id": "18"}]
        }"#;

        let meta = parse_info_json(json).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Video One"));
        assert_eq!(meta.duration, Some(212.0));
        assert_eq!(meta.extractor.as_deref(), Some("Youtube"));
        assert_eq!(meta.media_id.as_deref(), Some("abc123def45"));
        assert_eq!(meta.view_count, Some(1234));
    }

    #[test]
    fn test_parse_sparse_document() {
        let meta = parse_info_json(r#"{"title": "Clip", "extractor": "generic"}"#).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Clip"));
        assert_eq!(meta.extractor.as_deref(), Some("generic"));
        assert!(meta.duration.is_none());
    }

    #[test]
    fn test_parse_invalid_document() {
        assert!(matches!(
            parse_info_json("not json"),
            Err(MediaError::JsonParse(_))
        ));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = read_info_json(dir.path().join("missing.info.json")).await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
