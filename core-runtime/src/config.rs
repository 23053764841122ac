//! # Core Configuration Module
//!
//! Provides configuration management for the stream daemon.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the process-level settings and the injected HTTP
//! bridge. Validation is fail-fast: `build()` refuses configurations that
//! cannot possibly serve a request.
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - upstream media relay (desktop default: reqwest)
//!
//! When the `desktop-shims` feature is enabled, a desktop-ready `HttpClient`
//! is injected automatically if none was provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .bind_addr("127.0.0.1:5000".parse()?)
//!     .media_dir("/srv/music")
//!     .cookie_file("/etc/mpc/cookies.txt")
//!     .build()?;
//! ```
//!
//! ## Environment
//!
//! [`CoreConfig::from_env`] starts from the defaults and applies these
//! overrides:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `MPC_BIND` | `bind_addr` |
//! | `MPC_MEDIA_DIR` | `media_dir` |
//! | `MPC_COOKIE_FILE` | `cookie_file` |
//! | `MPC_VISITOR_DATA` | `visitor_data` |
//! | `MPC_CACHE_EXPIRY_SECS` | `cache_expiry_secs` |
//! | `MPC_LOG_FORMAT` | `logging.format` |
//! | `MPC_LOG_LEVEL` | `logging.level` |
//! | `MPC_LOG_FILTER` | `logging.filter` |

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use bridge_traits::HttpClient;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

/// Browser-like user agent sent upstream when relaying media bytes.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Process configuration for the stream daemon.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Address the HTTP API listens on
    pub bind_addr: SocketAddr,

    /// Directory holding local media files (`<id>.mp3`)
    pub media_dir: PathBuf,

    /// Netscape-format cookie file for the stored-credentials strategy
    pub cookie_file: Option<PathBuf>,

    /// Visitor data token for the anonymous-session strategy
    pub visitor_data: Option<String>,

    /// User agent used for upstream media requests
    pub user_agent: String,

    /// Global cache expiry in seconds
    pub cache_expiry_secs: u64,

    /// Connect timeout for upstream media requests
    pub upstream_connect_timeout: Duration,

    /// Logging setup
    pub logging: LoggingConfig,

    /// HTTP client for relaying upstream media (optional with desktop default)
    pub http_client: Option<Arc<dyn HttpClient>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("bind_addr", &self.bind_addr)
            .field("media_dir", &self.media_dir)
            .field("cookie_file", &self.cookie_file)
            .field(
                "visitor_data",
                &self.visitor_data.as_ref().map(|_| "[REDACTED]"),
            )
            .field("user_agent", &self.user_agent)
            .field("cache_expiry_secs", &self.cache_expiry_secs)
            .field("upstream_connect_timeout", &self.upstream_connect_timeout)
            .field("logging", &self.logging)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Builds a configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Unset keys keep their defaults; set but unparsable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = CoreConfig::builder();
        let mut logging = LoggingConfig::default();

        if let Some(bind) = lookup("MPC_BIND") {
            let addr = bind
                .parse::<SocketAddr>()
                .map_err(|e| Error::Config(format!("MPC_BIND '{}' is invalid: {}", bind, e)))?;
            builder = builder.bind_addr(addr);
        }

        if let Some(dir) = lookup("MPC_MEDIA_DIR") {
            builder = builder.media_dir(dir);
        }

        if let Some(file) = lookup("MPC_COOKIE_FILE").filter(|v| !v.trim().is_empty()) {
            builder = builder.cookie_file(file);
        }

        if let Some(token) = lookup("MPC_VISITOR_DATA").filter(|v| !v.trim().is_empty()) {
            builder = builder.visitor_data(token);
        }

        if let Some(expiry) = lookup("MPC_CACHE_EXPIRY_SECS") {
            let secs = expiry.trim().parse::<u64>().map_err(|e| {
                Error::Config(format!("MPC_CACHE_EXPIRY_SECS '{}' is invalid: {}", expiry, e))
            })?;
            builder = builder.cache_expiry_secs(secs);
        }

        if let Some(format) = lookup("MPC_LOG_FORMAT") {
            logging = logging.with_format(format.parse().map_err(Error::Config)?);
        }

        if let Some(level) = lookup("MPC_LOG_LEVEL") {
            logging = logging.with_level(level.parse().map_err(Error::Config)?);
        }

        if let Some(filter) = lookup("MPC_LOG_FILTER").filter(|v| !v.trim().is_empty()) {
            logging = logging.with_filter(filter);
        }

        builder.logging(logging).build()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Media directory is not empty
    /// - Cookie file path, when set, is not empty
    /// - Cache expiry is within 1 minute and 1 day
    /// - User agent is not blank
    pub fn validate(&self) -> Result<()> {
        if self.media_dir.as_os_str().is_empty() {
            return Err(Error::Config("Media directory cannot be empty".to_string()));
        }

        if let Some(cookie_file) = &self.cookie_file {
            if cookie_file.as_os_str().is_empty() {
                return Err(Error::Config(
                    "Cookie file path cannot be empty when set".to_string(),
                ));
            }
        }

        if self.cache_expiry_secs < 60 {
            return Err(Error::Config(
                "Cache expiry must be at least 60 seconds".to_string(),
            ));
        }

        if self.cache_expiry_secs > 86_400 {
            return Err(Error::Config(
                "Cache expiry exceeds maximum of 1 day (86,400 seconds)".to_string(),
            ));
        }

        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("User agent cannot be blank".to_string()));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(connect_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_connect_timeout(connect_timeout).map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_connect_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "An HttpClient implementation is required to relay upstream media. \
                 Enable the 'desktop-shims' feature to use the default ReqwestHttpClient, \
                 or inject one with CoreConfigBuilder::http_client."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    bind_addr: Option<SocketAddr>,
    media_dir: Option<PathBuf>,
    cookie_file: Option<PathBuf>,
    visitor_data: Option<String>,
    user_agent: Option<String>,
    cache_expiry_secs: Option<u64>,
    upstream_connect_timeout: Option<Duration>,
    logging: Option<LoggingConfig>,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl CoreConfigBuilder {
    /// Sets the listen address. Default: `127.0.0.1:5000`.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }

    /// Sets the local media directory. Default: `./media`.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .media_dir("/srv/music");
    /// ```
    pub fn media_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.media_dir = Some(path.into());
        self
    }

    /// Sets the cookie file used by the stored-credentials strategy.
    pub fn cookie_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cookie_file = Some(path.into());
        self
    }

    /// Sets the visitor data token used by the anonymous-session strategy.
    pub fn visitor_data(mut self, token: impl Into<String>) -> Self {
        self.visitor_data = Some(token.into());
        self
    }

    /// Overrides the upstream user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the global cache expiry. Default: 3600 seconds.
    pub fn cache_expiry_secs(mut self, secs: u64) -> Self {
        self.cache_expiry_secs = Some(secs);
        self
    }

    /// Sets the upstream connect timeout. Default: 10 seconds.
    pub fn upstream_connect_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_connect_timeout = Some(timeout);
        self
    }

    /// Sets the logging configuration.
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the final configuration.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if validation fails
    /// - `Error::CapabilityMissing` if no `HttpClient` is available
    pub fn build(self) -> Result<CoreConfig> {
        let bind_addr = match self.bind_addr {
            Some(addr) => addr,
            None => DEFAULT_BIND_ADDR
                .parse()
                .map_err(|e| Error::Internal(format!("Bad default bind address: {}", e)))?,
        };
        let upstream_connect_timeout = self
            .upstream_connect_timeout
            .unwrap_or(Duration::from_secs(10));

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(upstream_connect_timeout)?,
        };

        let config = CoreConfig {
            bind_addr,
            media_dir: self.media_dir.unwrap_or_else(|| PathBuf::from("media")),
            cookie_file: self.cookie_file,
            visitor_data: self.visitor_data,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            cache_expiry_secs: self.cache_expiry_secs.unwrap_or(3600),
            upstream_connect_timeout,
            logging: self.logging.unwrap_or_default(),
            http_client: Some(http_client),
        };

        config.validate()?;
        Ok(config)
    }
}
