//! Core service façade and bootstrap helpers.
//!
//! This crate wires the bridge implementations (HTTP relay, clock) and the
//! resolver into the shared cache, preload orchestrator and stream service,
//! and exposes the result over HTTP ([`api`]). The `mpc-streamd` binary is a
//! thin wrapper around [`bootstrap`] and [`api::router`].
//!
//! Desktop builds enable the `desktop-shims` feature, which injects the
//! reqwest-backed `HttpClient` through `core-runtime`.

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult, CoreError, Result};

use std::sync::Arc;

use bridge_traits::http::HttpClient;
use bridge_traits::time::{Clock, SystemClock};
use core_async::sync::CancellationToken;
use core_async::task::JoinHandle;
use core_playback::{
    CacheConfig, CacheStore, Janitor, PreloadConfig, PreloadOrchestrator, StreamConfig,
    StreamService, SweepSchedule,
};
use core_resolver::{ChainConfig, CommandExtractor, MediaResolver, StrategyChain, StrategyKind};
use core_runtime::CoreConfig;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{info, warn};

/// Platform name served from the local media directory.
pub const LOCAL_PLATFORM: &str = "local";

/// Aggregated handle to everything the service needs from outside.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub resolver: Arc<dyn MediaResolver>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle using the system clock.
    pub fn new(http_client: Arc<dyn HttpClient>, resolver: Arc<dyn MediaResolver>) -> Self {
        Self {
            http_client,
            resolver,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Tunables for every component behind the façade.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub cache: CacheConfig,
    pub preload: PreloadConfig,
    pub stream: StreamConfig,
    pub chain: ChainConfig,
    /// Platforms resolved through the strategy chain
    pub remote_platforms: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            preload: PreloadConfig::default(),
            stream: StreamConfig::default(),
            chain: ChainConfig::default(),
            remote_platforms: vec!["youtube".to_string()],
        }
    }
}

impl ServiceConfig {
    /// Derive component settings from the process configuration.
    pub fn from_core(config: &CoreConfig) -> Self {
        let defaults = Self::default();
        Self {
            cache: defaults
                .cache
                .with_expiry(Duration::from_secs(config.cache_expiry_secs)),
            stream: defaults
                .stream
                .with_user_agent(config.user_agent.clone())
                .with_media_dir(config.media_dir.clone()),
            ..defaults
        }
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_preload(mut self, preload: PreloadConfig) -> Self {
        self.preload = preload;
        self
    }

    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_remote_platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remote_platforms = platforms.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        self.cache.validate()?;
        self.preload.validate()?;
        self.stream.validate()?;
        self.chain.validate()?;

        if self.remote_platforms.is_empty() {
            return Err("at least one remote platform is required".to_string());
        }
        if self
            .remote_platforms
            .iter()
            .any(|p| p.trim().is_empty() || p == LOCAL_PLATFORM)
        {
            return Err(format!(
                "remote platforms cannot be blank or '{}'",
                LOCAL_PLATFORM
            ));
        }
        Ok(())
    }

    /// Whether `platform` is resolved remotely.
    pub fn is_remote(&self, platform: &str) -> bool {
        self.remote_platforms.iter().any(|p| p == platform)
    }
}

struct ServiceInner {
    config: ServiceConfig,
    store: Arc<CacheStore>,
    preload: PreloadOrchestrator,
    stream: StreamService,
    /// Set once the janitor is running
    schedule: Mutex<Option<Arc<SweepSchedule>>>,
    shutdown: CancellationToken,
}

/// Primary façade shared by every HTTP handler.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

impl CoreService {
    /// Create a new service from the provided dependencies.
    pub fn new(deps: CoreDependencies, config: ServiceConfig) -> Result<Self> {
        config.validate().map_err(CoreError::InvalidConfig)?;

        let store = Arc::new(CacheStore::new(config.cache.clone(), deps.clock));
        let preload = PreloadOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&deps.resolver),
            config.preload.clone(),
        );
        let stream = StreamService::new(
            Arc::clone(&store),
            deps.resolver,
            deps.http_client,
            config.stream.clone(),
        );
        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                store,
                preload,
                stream,
                schedule: Mutex::new(None),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.inner.store
    }

    pub fn preload(&self) -> &PreloadOrchestrator {
        &self.inner.preload
    }

    pub fn stream(&self) -> &StreamService {
        &self.inner.stream
    }

    /// Seconds until the janitor's next scheduled sweep, or `None` when the
    /// janitor has not been started.
    pub fn next_sweep_secs(&self) -> Option<u64> {
        let schedule = self.inner.schedule.lock().clone()?;
        Some(schedule.seconds_until_next(self.inner.store.now()))
    }

    /// Start the background janitor. Only the first call spawns a task.
    pub fn start_janitor(&self) -> Option<JoinHandle<()>> {
        let mut schedule = self.inner.schedule.lock();
        if schedule.is_some() {
            return None;
        }
        let janitor = Janitor::new(Arc::clone(&self.inner.store));
        *schedule = Some(janitor.schedule());
        Some(janitor.spawn(self.inner.shutdown.child_token()))
    }

    /// Token cancelled by [`CoreService::shutdown`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Stop background tasks.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            info!("Shutting down core service");
            self.inner.shutdown.cancel();
        }
    }
}

/// Build a [`CoreService`] from process configuration, using the stock
/// `yt-dlp` extractor behind the default strategy order.
pub async fn bootstrap(config: CoreConfig) -> Result<CoreService> {
    let http_client = config
        .http_client
        .clone()
        .ok_or_else(|| CoreError::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: "No HttpClient was configured for the upstream relay".to_string(),
        })?;

    let service_config = ServiceConfig::from_core(&config);
    let chain = StrategyChain::from_kinds(
        strategy_kinds(&config).await,
        Arc::new(CommandExtractor::default()),
        service_config.chain.clone(),
    );
    info!(strategies = ?chain.strategy_names(), "Resolution chain ready");

    let deps = CoreDependencies::new(http_client, Arc::new(chain));
    CoreService::new(deps, service_config)
}

/// Strategy order for `config`. A configured cookie file always keeps the
/// stored-credentials strategy; a file that fails validation is only
/// reported, since it may become readable later.
pub async fn strategy_kinds(config: &CoreConfig) -> Vec<StrategyKind> {
    if let Some(path) = &config.cookie_file {
        if let Err(e) = core_resolver::validate_cookie_file(path).await {
            warn!(path = %path.display(), error = %e, "Cookie file looks unusable, keeping stored credentials anyway");
        }
    }
    StrategyKind::default_order(config.cookie_file.clone(), config.visitor_data.clone())
}
