//! Error types for media resolution

use thiserror::Error;

/// Why a resolution attempt failed.
///
/// `RateLimited` and `AuthRequired` drive the chain's pacing decisions and
/// never leave the resolver on their own: once every strategy has failed the
/// caller sees [`ResolutionError::Exhausted`] wrapping the last cause.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    /// Media ID was empty or blank
    #[error("Invalid media id: {0:?}")]
    InvalidMediaId(String),

    /// Upstream throttled the request (HTTP 429 or equivalent)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Upstream demands sign-in or flagged the client as a bot
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// Media does not exist, is private, or is unavailable
    #[error("Media not found: {0}")]
    NotFound(String),

    /// Extraction succeeded but no format carries audio
    #[error("No audio formats found")]
    NoAudioFormats,

    /// Anything else the extractor reported
    #[error("Resolution failed: {0}")]
    Unknown(String),

    /// Every strategy failed
    #[error("All {attempts} strategies failed. Last error: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<ResolutionError>,
    },
}

impl ResolutionError {
    /// Classify a free-form extractor message.
    ///
    /// Matching is case-insensitive and checked in this order: rate limiting
    /// (`429`, `too many requests`), authentication (`sign in`, `bot`),
    /// not-found (`not found`, `unavailable`, `private video`). Everything
    /// else is `Unknown`.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("429") || lower.contains("too many requests") {
            ResolutionError::RateLimited(message)
        } else if lower.contains("sign in") || lower.contains("bot") {
            ResolutionError::AuthRequired(message)
        } else if lower.contains("not found")
            || lower.contains("unavailable")
            || lower.contains("private video")
        {
            ResolutionError::NotFound(message)
        } else {
            ResolutionError::Unknown(message)
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ResolutionError::RateLimited(_))
    }

    pub fn is_auth_required(&self) -> bool {
        matches!(self, ResolutionError::AuthRequired(_))
    }

    /// The innermost cause, looking through `Exhausted`.
    pub fn root_cause(&self) -> &ResolutionError {
        match self {
            ResolutionError::Exhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

/// Result type for resolution operations
pub type Result<T> = std::result::Result<T, ResolutionError>;
