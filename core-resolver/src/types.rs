//! Resolution data types
//!
//! `MediaInfo`/`MediaFormat` mirror the subset of the extractor's JSON dump
//! that resolution looks at. Every field is optional on the wire.

use serde::{Deserialize, Serialize};

/// One downloadable format reported by the extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaFormat {
    #[serde(default)]
    pub format_id: Option<String>,

    /// Direct URL of this format
    #[serde(default)]
    pub url: Option<String>,

    /// Container extension (`m4a`, `webm`, `mp4`, ...)
    #[serde(default)]
    pub ext: Option<String>,

    /// Audio codec; the literal `"none"` marks a video-only format
    #[serde(default)]
    pub acodec: Option<String>,

    /// Average audio bitrate (kbit/s)
    #[serde(default)]
    pub abr: Option<f64>,

    /// Total bitrate (kbit/s)
    #[serde(default)]
    pub tbr: Option<f64>,

    /// Human-readable quality label
    #[serde(default)]
    pub format_note: Option<String>,
}

impl MediaFormat {
    /// A format carries audio unless its codec is explicitly `"none"`.
    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some("none")
    }
}

/// Raw extraction output for one media ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub uploader: Option<String>,

    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,

    #[serde(default)]
    pub formats: Vec<MediaFormat>,
}

/// Descriptive metadata carried alongside a resolved URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleMeta {
    pub title: String,
    pub uploader: String,
}

impl Default for TitleMeta {
    fn default() -> Self {
        Self {
            title: "Unknown".to_string(),
            uploader: "Unknown".to_string(),
        }
    }
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Time-limited direct stream URL
    pub direct_url: String,
    /// Quality label of the chosen format
    pub format_label: String,
    /// Container of the chosen format
    pub container: String,
    pub duration_seconds: f64,
    pub title_meta: TitleMeta,
}
