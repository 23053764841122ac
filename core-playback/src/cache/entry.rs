//! Cache entry model

use chrono::{DateTime, Utc};
use core_resolver::ResolutionResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why a batch of tracks was preloaded.
///
/// Only `AdjacentTracks` batches react to playback changes. Unknown labels
/// are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PreloadContext {
    /// Neighbours of the currently playing track
    #[default]
    AdjacentTracks,
    /// First tracks of a freshly shuffled queue
    ShuffleStart,
    Other(String),
}

impl PreloadContext {
    pub fn as_str(&self) -> &str {
        match self {
            PreloadContext::AdjacentTracks => "adjacent_tracks",
            PreloadContext::ShuffleStart => "shuffle_start",
            PreloadContext::Other(label) => label,
        }
    }

    /// Whether the batch stops when the playing track changes.
    pub fn follows_playback(&self) -> bool {
        matches!(self, PreloadContext::AdjacentTracks)
    }
}

impl From<&str> for PreloadContext {
    fn from(label: &str) -> Self {
        match label {
            "adjacent_tracks" => PreloadContext::AdjacentTracks,
            "shuffle_start" => PreloadContext::ShuffleStart,
            other => PreloadContext::Other(other.to_string()),
        }
    }
}

impl From<String> for PreloadContext {
    fn from(label: String) -> Self {
        PreloadContext::from(label.as_str())
    }
}

impl From<PreloadContext> for String {
    fn from(context: PreloadContext) -> Self {
        context.as_str().to_string()
    }
}

impl fmt::Display for PreloadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cached resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub media_id: String,
    pub direct_url: String,
    pub resolved_at: DateTime<Utc>,
    pub format_label: String,
    pub duration_seconds: f64,
    /// Written by a preload and not served yet
    pub preloaded: bool,
    /// Served at least once
    pub used: bool,
    pub context: Option<PreloadContext>,
}

impl CacheEntry {
    /// A neutral entry for a resolution made at `resolved_at`.
    pub fn from_resolution(
        media_id: impl Into<String>,
        result: &ResolutionResult,
        resolved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            media_id: media_id.into(),
            direct_url: result.direct_url.clone(),
            resolved_at,
            format_label: result.format_label.clone(),
            duration_seconds: result.duration_seconds,
            preloaded: false,
            used: false,
            context: None,
        }
    }

    /// Mark as speculatively resolved.
    pub fn into_preloaded(mut self, context: PreloadContext) -> Self {
        self.preloaded = true;
        self.used = false;
        self.context = Some(context);
        self
    }

    /// Mark as served.
    pub fn into_used(mut self) -> Self {
        self.mark_served();
        self
    }

    pub fn mark_served(&mut self) {
        self.preloaded = false;
        self.used = true;
    }

    /// Age in milliseconds at `now`. Negative if `resolved_at` lies ahead.
    pub fn age_millis(&self, now: DateTime<Utc>) -> i64 {
        (now - self.resolved_at).num_milliseconds()
    }

    /// Strictly younger than `bound`.
    pub fn is_younger_than(&self, now: DateTime<Utc>, bound: Duration) -> bool {
        (self.age_millis(now) as i128) < bound.as_millis() as i128
    }

    /// Strictly older than `bound`.
    pub fn is_older_than(&self, now: DateTime<Utc>, bound: Duration) -> bool {
        (self.age_millis(now) as i128) > bound.as_millis() as i128
    }
}
