//! # Playback Error Types
//!
//! Errors raised by the cache, the preload orchestrator and the stream
//! server. Resolution failure details stay in [`ResolutionError`]; callers
//! outside this crate only ever see them wrapped in `NoPlayableUrl`.

use core_async::sync::LockTimeout;
use core_resolver::ResolutionError;
use thiserror::Error;

/// Errors that can occur while caching or serving media.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Shared State Errors
    // ========================================================================
    /// The shared cache lock could not be acquired in time.
    #[error(transparent)]
    LockTimeout(#[from] LockTimeout),

    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// Every resolution strategy failed for this media ID.
    #[error("No playable URL: {0}")]
    NoPlayableUrl(#[source] ResolutionError),

    /// Media ID is empty or not a safe identifier.
    #[error("Invalid media id: {0:?}")]
    InvalidMediaId(String),

    /// Request is structurally unusable (for example an empty batch).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ========================================================================
    // Upstream Errors
    // ========================================================================
    /// Request to the upstream media host failed.
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetch(String),

    /// Upstream answered with something other than 200 or 206.
    #[error("Upstream returned HTTP {0}")]
    UpstreamStatus(u16),

    // ========================================================================
    // Local File Errors
    // ========================================================================
    /// Requested byte range lies outside the file.
    #[error("Range not satisfiable for {size} bytes")]
    RangeNotSatisfiable { size: u64 },

    /// Local media file does not exist.
    #[error("Media not found: {0}")]
    NotFound(String),

    /// Platform segment of the request is not served here.
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PlaybackError {
    /// Whether the failure came from the upstream media host.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            PlaybackError::UpstreamFetch(_) | PlaybackError::UpstreamStatus(_)
        )
    }

    /// Whether the failure is a lock-acquisition timeout.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, PlaybackError::LockTimeout(_))
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_lock_timeout_converts() {
        let err: PlaybackError = LockTimeout {
            name: "cache",
            waited: Duration::from_secs(2),
        }
        .into();
        assert!(err.is_lock_timeout());
        assert!(err.to_string().contains("cache"));
    }

    #[test]
    fn test_upstream_classification() {
        assert!(PlaybackError::UpstreamStatus(403).is_upstream());
        assert!(PlaybackError::UpstreamFetch("reset".into()).is_upstream());
        assert!(!PlaybackError::NotFound("x".into()).is_upstream());
    }

    #[test]
    fn test_no_playable_url_message() {
        let err = PlaybackError::NoPlayableUrl(ResolutionError::NoAudioFormats);
        assert!(err.to_string().starts_with("No playable URL"));
    }
}
