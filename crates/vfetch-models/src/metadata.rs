//! Media metadata harvested from the download tool.

use serde::{Deserialize, Serialize};

/// Descriptive fields reported by the download tool for a fetched video.
///
/// Every field is optional because extractors differ widely in what they
/// expose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Name of the site extractor that handled the URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webpage_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    /// Upload date as reported by the site (YYYYMMDD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,

    /// Container extension of the downloaded media
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,

    /// Site-specific media identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
}

impl MediaMetadata {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metadata_serializes_to_empty_object() {
        let meta = MediaMetadata::default();
        assert!(meta.is_empty());
        assert_eq!(serde_json::to_string(&meta).unwrap(), "{}");
    }

    #[test]
    fn test_partial_metadata() {
        let meta = MediaMetadata {
            title: Some("Video One".into()),
            duration: Some(12.5),
            ..Default::default()
        };
        assert!(!meta.is_empty());

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["title"], "Video One");
        assert_eq!(json["duration"], 12.5);
        assert!(json.get("uploader").is_none());
    }
}
