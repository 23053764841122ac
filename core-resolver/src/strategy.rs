//! Resolution strategies
//!
//! A strategy is one way of asking the extractor for a media ID: a request
//! profile (user agent, headers, credentials, extractor arguments) plus the
//! shared format-selection step. Strategies differ only in how they present
//! themselves upstream, so they are a tagged list rather than a type
//! hierarchy.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::cookies::validate_cookie_file;
use crate::error::Result;
use crate::format::{select_best_format, DEFAULT_CONTAINER};
use crate::types::{MediaInfo, ResolutionResult};

const DESKTOP_CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DESKTOP_SHORT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const LINUX_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";
const MOBILE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) \
     AppleWebKit/605.1.15 Mobile/15E148";

/// How a single extraction request presents itself upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestProfile {
    /// Strategy name, for logs
    pub strategy: &'static str,
    pub user_agent: String,
    /// Extra request headers besides the user agent
    pub headers: Vec<(String, String)>,
    pub cookie_file: Option<PathBuf>,
    /// Extractor-specific arguments, `namespace:key=value;key=value`
    pub extractor_args: Vec<String>,
}

impl RequestProfile {
    fn new(strategy: &'static str, user_agent: &str) -> Self {
        Self {
            strategy,
            user_agent: user_agent.to_string(),
            headers: Vec::new(),
            cookie_file: None,
            extractor_args: Vec::new(),
        }
    }

    fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }
}

/// The built-in strategy variants, in their default order.
#[derive(Clone, PartialEq, Eq)]
pub enum StrategyKind {
    /// Signed-in session from a Netscape cookie file
    StoredCredentials { cookie_file: PathBuf },
    /// Anonymous session skipping the watch page
    AnonymousSession { visitor_data: Option<String> },
    /// Bare desktop request
    MinimalHeaders,
    /// Request posing as a mobile browser
    MobileClient,
}

impl fmt::Debug for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::StoredCredentials { cookie_file } => f
                .debug_struct("StoredCredentials")
                .field("cookie_file", cookie_file)
                .finish(),
            StrategyKind::AnonymousSession { visitor_data } => f
                .debug_struct("AnonymousSession")
                .field("visitor_data", &visitor_data.as_ref().map(|_| "[REDACTED]"))
                .finish(),
            StrategyKind::MinimalHeaders => f.write_str("MinimalHeaders"),
            StrategyKind::MobileClient => f.write_str("MobileClient"),
        }
    }
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::StoredCredentials { .. } => "with_cookies",
            StrategyKind::AnonymousSession { .. } => "visitor_data",
            StrategyKind::MinimalHeaders => "minimal_headers",
            StrategyKind::MobileClient => "mobile_headers",
        }
    }

    /// Request profile this strategy sends.
    pub fn profile(&self) -> RequestProfile {
        match self {
            StrategyKind::StoredCredentials { cookie_file } => {
                let mut profile = RequestProfile::new(self.name(), DESKTOP_CHROME_UA)
                    .with_header("Accept-Language", "en-US,en;q=0.9");
                profile.cookie_file = Some(cookie_file.clone());
                profile
            }
            StrategyKind::AnonymousSession { visitor_data } => {
                let mut profile = RequestProfile::new(self.name(), DESKTOP_SHORT_UA)
                    .with_header("Accept-Language", "en-US,en;q=0.9");
                let mut youtube_args = "youtube:player_skip=webpage,configs".to_string();
                if let Some(token) = visitor_data {
                    youtube_args.push_str(";visitor_data=");
                    youtube_args.push_str(token);
                }
                profile.extractor_args.push(youtube_args);
                profile
                    .extractor_args
                    .push("youtubetab:skip=webpage".to_string());
                profile
            }
            StrategyKind::MinimalHeaders => {
                RequestProfile::new(self.name(), LINUX_UA).with_header("Accept", "*/*")
            }
            StrategyKind::MobileClient => RequestProfile::new(self.name(), MOBILE_UA)
                .with_header("Accept", "*/*")
                .with_header("Accept-Language", "en-US,en;q=0.5"),
        }
    }

    /// The default ordered list. Stored credentials come first when a cookie
    /// file is configured.
    pub fn default_order(
        cookie_file: Option<PathBuf>,
        visitor_data: Option<String>,
    ) -> Vec<StrategyKind> {
        let mut kinds = Vec::with_capacity(4);
        if let Some(cookie_file) = cookie_file {
            kinds.push(StrategyKind::StoredCredentials { cookie_file });
        }
        kinds.push(StrategyKind::AnonymousSession { visitor_data });
        kinds.push(StrategyKind::MinimalHeaders);
        kinds.push(StrategyKind::MobileClient);
        kinds
    }
}

/// The opaque third-party extraction step.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetch raw media info for `media_id` using `profile`.
    ///
    /// Failures should already be classified (see
    /// [`ResolutionError::classify`](crate::error::ResolutionError::classify)).
    async fn extract(&self, media_id: &str, profile: &RequestProfile) -> Result<MediaInfo>;
}

/// One attempt at turning a media ID into a direct URL.
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, media_id: &str) -> Result<ResolutionResult>;
}

/// A [`StrategyKind`] backed by an [`Extractor`].
pub struct ExtractorStrategy {
    kind: StrategyKind,
    extractor: Arc<dyn Extractor>,
    preferred_container: String,
}

impl ExtractorStrategy {
    pub fn new(kind: StrategyKind, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            kind,
            extractor,
            preferred_container: DEFAULT_CONTAINER.to_string(),
        }
    }

    pub fn with_preferred_container(mut self, container: impl Into<String>) -> Self {
        self.preferred_container = container.into();
        self
    }

    pub fn kind(&self) -> &StrategyKind {
        &self.kind
    }
}

#[async_trait]
impl ResolveStrategy for ExtractorStrategy {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn attempt(&self, media_id: &str) -> Result<ResolutionResult> {
        if let StrategyKind::StoredCredentials { cookie_file } = &self.kind {
            validate_cookie_file(cookie_file).await?;
        }

        let profile = self.kind.profile();
        let info = self.extractor.extract(media_id, &profile).await?;
        let result = select_best_format(&info, &self.preferred_container)?;

        debug!(
            strategy = self.name(),
            media_id = %media_id,
            format = %result.format_label,
            container = %result.container,
            "Selected audio format"
        );

        Ok(result)
    }
}
