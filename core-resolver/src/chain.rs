//! # Resolution Strategy Chain
//!
//! Tries strategies strictly in order until one yields a playable URL.
//!
//! ```text
//!   resolve(id)
//!      │
//!      ├─► pause(attempt_pause) ─► strategy[0].attempt(id)
//!      │        ok + url ───────────────────────────────► return
//!      │        RateLimited ─► pause(rate_limit_pause) ─┐
//!      │        AuthRequired ─────────────────────────┐ │
//!      │        other / empty url ──────────────────┐ │ │
//!      │                                            ▼ ▼ ▼
//!      ├─► pause(attempt_pause) ─► strategy[1].attempt(id)
//!      │   ...
//!      └─► Exhausted { attempts, last }
//! ```
//!
//! Pacing uses `core_async::time`, so tests can run the chain on Tokio's
//! paused clock.

use async_trait::async_trait;
use core_async::time::{sleep, Duration};
use core_runtime::logging::redact_url;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{ResolutionError, Result};
use crate::strategy::{Extractor, ExtractorStrategy, ResolveStrategy, StrategyKind};
use crate::types::ResolutionResult;

/// Resolves a media ID into a direct-stream URL.
///
/// This is the seam the cache and stream layers depend on; tests substitute
/// their own implementations.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, media_id: &str) -> Result<ResolutionResult>;
}

/// Pacing for [`StrategyChain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Pause before every attempt, including the first
    pub attempt_pause: Duration,
    /// Extra pause after a rate-limited attempt
    pub rate_limit_pause: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            attempt_pause: Duration::from_millis(500),
            rate_limit_pause: Duration::from_secs(2),
        }
    }
}

impl ChainConfig {
    pub fn with_attempt_pause(mut self, pause: Duration) -> Self {
        self.attempt_pause = pause;
        self
    }

    pub fn with_rate_limit_pause(mut self, pause: Duration) -> Self {
        self.rate_limit_pause = pause;
        self
    }

    /// No pauses at all.
    pub fn immediate() -> Self {
        Self {
            attempt_pause: Duration::ZERO,
            rate_limit_pause: Duration::ZERO,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.attempt_pause > Duration::from_secs(30) {
            return Err("attempt_pause must not exceed 30 seconds".to_string());
        }
        if self.rate_limit_pause > Duration::from_secs(60) {
            return Err("rate_limit_pause must not exceed 60 seconds".to_string());
        }
        Ok(())
    }
}

/// Ordered list of strategies with fallback and pacing.
pub struct StrategyChain {
    strategies: Vec<Arc<dyn ResolveStrategy>>,
    config: ChainConfig,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Arc<dyn ResolveStrategy>>, config: ChainConfig) -> Self {
        Self { strategies, config }
    }

    /// Builds the default chain over one extractor.
    pub fn from_kinds(
        kinds: Vec<StrategyKind>,
        extractor: Arc<dyn Extractor>,
        config: ChainConfig,
    ) -> Self {
        let strategies = kinds
            .into_iter()
            .map(|kind| {
                Arc::new(ExtractorStrategy::new(kind, Arc::clone(&extractor)))
                    as Arc<dyn ResolveStrategy>
            })
            .collect();
        Self::new(strategies, config)
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}

#[async_trait]
impl MediaResolver for StrategyChain {
    #[instrument(skip(self))]
    async fn resolve(&self, media_id: &str) -> Result<ResolutionResult> {
        if media_id.trim().is_empty() {
            return Err(ResolutionError::InvalidMediaId(media_id.to_string()));
        }

        let mut attempts = 0usize;
        let mut last_error: Option<ResolutionError> = None;

        for strategy in &self.strategies {
            if !self.config.attempt_pause.is_zero() {
                sleep(self.config.attempt_pause).await;
            }
            attempts += 1;

            debug!(strategy = strategy.name(), attempt = attempts, "Trying strategy");

            match strategy.attempt(media_id).await {
                Ok(result) if !result.direct_url.is_empty() => {
                    info!(
                        strategy = strategy.name(),
                        attempt = attempts,
                        format = %result.format_label,
                        url = %redact_url(&result.direct_url),
                        "Resolved media"
                    );
                    return Ok(result);
                }
                Ok(_) => {
                    warn!(strategy = strategy.name(), "Strategy returned an empty URL");
                    last_error = Some(ResolutionError::Unknown(format!(
                        "strategy {} returned an empty URL",
                        strategy.name()
                    )));
                }
                Err(err) if err.is_rate_limited() => {
                    warn!(
                        strategy = strategy.name(),
                        pause_ms = self.config.rate_limit_pause.as_millis() as u64,
                        error = %err,
                        "Rate limited, backing off before next strategy"
                    );
                    last_error = Some(err);
                    if !self.config.rate_limit_pause.is_zero() {
                        sleep(self.config.rate_limit_pause).await;
                    }
                }
                Err(err) if err.is_auth_required() => {
                    debug!(strategy = strategy.name(), error = %err, "Authentication required");
                    last_error = Some(err);
                }
                Err(err) => {
                    warn!(strategy = strategy.name(), error = %err, "Strategy failed");
                    last_error = Some(err);
                }
            }
        }

        let last = last_error
            .unwrap_or_else(|| ResolutionError::Unknown("no strategies configured".to_string()));
        warn!(attempts, error = %last, "All strategies failed");

        Err(ResolutionError::Exhausted {
            attempts,
            last: Box::new(last),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TitleMeta;
    use core_async::time::Instant;
    use std::sync::Mutex;

    /// Strategy that replays one canned outcome and records when it ran.
    struct Scripted {
        name: &'static str,
        outcome: Result<ResolutionResult>,
        calls: Mutex<Vec<Instant>>,
    }

    impl Scripted {
        fn new(name: &'static str, outcome: Result<ResolutionResult>) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn first_call(&self) -> Instant {
            self.calls.lock().unwrap()[0]
        }
    }

    #[async_trait]
    impl ResolveStrategy for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn attempt(&self, _media_id: &str) -> Result<ResolutionResult> {
            self.calls.lock().unwrap().push(Instant::now());
            self.outcome.clone()
        }
    }

    fn ok(url: &str) -> Result<ResolutionResult> {
        Ok(ResolutionResult {
            direct_url: url.to_string(),
            format_label: "medium".to_string(),
            container: "m4a".to_string(),
            duration_seconds: 180.0,
            title_meta: TitleMeta::default(),
        })
    }

    fn chain(strategies: Vec<Arc<Scripted>>) -> StrategyChain {
        StrategyChain::new(
            strategies
                .into_iter()
                .map(|s| s as Arc<dyn ResolveStrategy>)
                .collect(),
            ChainConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_through_auth_and_rate_limit() {
        let a = Scripted::new("a", Err(ResolutionError::AuthRequired("sign in".into())));
        let b = Scripted::new("b", Err(ResolutionError::RateLimited("429".into())));
        let c = Scripted::new("c", ok("https://cdn.example/c"));

        let start = Instant::now();
        let result = chain(vec![a.clone(), b.clone(), c.clone()])
            .resolve("vid")
            .await
            .unwrap();

        assert_eq!(result.direct_url, "https://cdn.example/c");
        assert_eq!(a.call_count(), 1);
        assert_eq!(b.call_count(), 1);
        assert_eq!(c.call_count(), 1);

        // Three attempt pauses plus one rate-limit pause.
        assert!(start.elapsed() >= Duration::from_millis(3 * 500 + 2000));
        // The rate-limit pause sits between b and c.
        assert!(c.first_call() - b.first_call() >= Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_required_falls_through_without_extra_delay() {
        let a = Scripted::new("a", Err(ResolutionError::AuthRequired("bot".into())));
        let b = Scripted::new("b", ok("https://cdn.example/b"));

        chain(vec![a.clone(), b.clone()]).resolve("vid").await.unwrap();

        let gap = b.first_call() - a.first_call();
        assert!(gap >= Duration::from_millis(500));
        assert!(gap < Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_stops_the_chain() {
        let a = Scripted::new("a", ok("https://cdn.example/a"));
        let b = Scripted::new("b", ok("https://cdn.example/b"));

        let result = chain(vec![a.clone(), b.clone()]).resolve("vid").await.unwrap();

        assert_eq!(result.direct_url, "https://cdn.example/a");
        assert_eq!(b.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_url_falls_through() {
        let a = Scripted::new("a", ok(""));
        let b = Scripted::new("b", ok("https://cdn.example/b"));

        let result = chain(vec![a.clone(), b]).resolve("vid").await.unwrap();
        assert_eq!(result.direct_url, "https://cdn.example/b");
        assert_eq!(a.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_reports_last_error() {
        let a = Scripted::new("a", Err(ResolutionError::RateLimited("429".into())));
        let b = Scripted::new("b", Err(ResolutionError::NotFound("gone".into())));

        let err = chain(vec![a, b]).resolve("vid").await.unwrap_err();

        assert_eq!(
            err,
            ResolutionError::Exhausted {
                attempts: 2,
                last: Box::new(ResolutionError::NotFound("gone".into())),
            }
        );
        assert!(err.to_string().starts_with("All 2 strategies failed. Last error"));
    }

    #[tokio::test]
    async fn test_blank_media_id_is_rejected_before_any_attempt() {
        let a = Scripted::new("a", ok("https://cdn.example/a"));

        let err = chain(vec![a.clone()]).resolve("   ").await.unwrap_err();

        assert!(matches!(err, ResolutionError::InvalidMediaId(_)));
        assert_eq!(a.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_chain_is_exhausted() {
        let err = chain(Vec::new()).resolve("vid").await.unwrap_err();
        assert!(matches!(err, ResolutionError::Exhausted { attempts: 0, .. }));
    }

    #[test]
    fn test_chain_config_validate() {
        assert!(ChainConfig::default().validate().is_ok());
        assert!(ChainConfig::default()
            .with_rate_limit_pause(Duration::from_secs(600))
            .validate()
            .is_err());
        assert_eq!(ChainConfig::immediate().attempt_pause, Duration::ZERO);
    }
}
