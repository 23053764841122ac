//! # Preload Orchestrator
//!
//! Resolves tracks the client is likely to play next and parks the results in
//! the cache as `preloaded` entries.
//!
//! A batch runs as its own task and never fails as a whole: each item's lock
//! timeouts and resolution errors are logged and counted, then the batch
//! moves on. `adjacent_tracks` batches additionally stop as soon as the
//! client reports a different playing track.
//!
//! ```text
//! for id in batch:
//!   adjacent_tracks && current_track_id set?
//!       playing track differs ──────────────► abort batch
//!   fresh under preload threshold? ─────────► skip
//!   resolve ─► put(preloaded = true)
//!   pause (300 ms shuffle_start, 500 ms otherwise)
//! ```

use core_async::task::{self, JoinHandle};
use core_async::time::sleep;
use core_resolver::MediaResolver;
use core_runtime::logging::redact_url;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheEntry, CacheStore, PreloadContext};
use crate::error::{PlaybackError, Result};

/// Pacing between preload resolutions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadConfig {
    /// Pause after each resolution in a `shuffle_start` batch (default: 300ms)
    pub shuffle_pause: Duration,
    /// Pause after each resolution in any other batch (default: 500ms)
    pub default_pause: Duration,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            shuffle_pause: Duration::from_millis(300),
            default_pause: Duration::from_millis(500),
        }
    }
}

impl PreloadConfig {
    pub fn with_shuffle_pause(mut self, pause: Duration) -> Self {
        self.shuffle_pause = pause;
        self
    }

    pub fn with_default_pause(mut self, pause: Duration) -> Self {
        self.default_pause = pause;
        self
    }

    pub fn pause_for(&self, context: &PreloadContext) -> Duration {
        match context {
            PreloadContext::ShuffleStart => self.shuffle_pause,
            _ => self.default_pause,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let limit = Duration::from_secs(10);
        if self.shuffle_pause > limit || self.default_pause > limit {
            return Err("preload pauses must not exceed 10 seconds".to_string());
        }
        Ok(())
    }
}

/// One preload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadRequest {
    pub ids: Vec<String>,
    /// Track that was playing when the batch was requested
    pub current_track_id: Option<String>,
    pub context: PreloadContext,
}

impl PreloadRequest {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            current_track_id: None,
            context: PreloadContext::default(),
        }
    }

    pub fn with_current_track(mut self, track_id: impl Into<String>) -> Self {
        self.current_track_id = Some(track_id.into());
        self
    }

    pub fn with_context(mut self, context: PreloadContext) -> Self {
        self.context = context;
        self
    }
}

/// Caller-side split of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadPlan {
    pub accepted: Vec<String>,
    pub already_cached: Vec<String>,
}

/// Returned by [`PreloadOrchestrator::start`] before any resolution happens.
#[derive(Debug)]
pub struct PreloadTicket {
    pub accepted: usize,
    pub skipped: usize,
    pub context: PreloadContext,
    /// `None` when nothing needed resolving
    pub handle: Option<JoinHandle<PreloadOutcome>>,
}

/// What a finished batch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreloadOutcome {
    pub resolved: usize,
    pub failed: usize,
    pub skipped_fresh: usize,
    /// Items skipped because the cache lock could not be acquired
    pub lock_skipped: usize,
    /// Stopped early because the playing track changed
    pub aborted: bool,
}

/// Runs preload batches against the shared cache.
#[derive(Clone)]
pub struct PreloadOrchestrator {
    store: Arc<CacheStore>,
    resolver: Arc<dyn MediaResolver>,
    config: PreloadConfig,
}

impl PreloadOrchestrator {
    pub fn new(
        store: Arc<CacheStore>,
        resolver: Arc<dyn MediaResolver>,
        config: PreloadConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            config,
        }
    }

    pub fn config(&self) -> &PreloadConfig {
        &self.config
    }

    /// Drop IDs that are already fresh under the preload threshold.
    pub async fn plan(&self, ids: &[String]) -> Result<PreloadPlan> {
        let threshold = self.store.config().preload_fresh_threshold;
        let (accepted, already_cached) = self.store.partition_fresh(ids, threshold).await?;
        Ok(PreloadPlan {
            accepted,
            already_cached,
        })
    }

    /// Plan the request and spawn the remaining work. Returns without
    /// waiting for any resolution.
    #[instrument(skip(self, request), fields(context = %request.context, requested = request.ids.len()))]
    pub async fn start(&self, request: PreloadRequest) -> Result<PreloadTicket> {
        if request.ids.is_empty() {
            return Err(PlaybackError::InvalidRequest(
                "preload request has no track ids".to_string(),
            ));
        }

        let plan = self.plan(&request.ids).await?;
        let accepted = plan.accepted.len();
        let skipped = plan.already_cached.len();
        let context = request.context.clone();

        if plan.accepted.is_empty() {
            debug!(skipped, "All tracks already cached");
            return Ok(PreloadTicket {
                accepted,
                skipped,
                context,
                handle: None,
            });
        }

        info!(accepted, skipped, "Preloading started");

        let batch = PreloadRequest {
            ids: plan.accepted,
            ..request
        };
        let orchestrator = self.clone();
        let handle = task::spawn(async move { orchestrator.run(batch).await });

        Ok(PreloadTicket {
            accepted,
            skipped,
            context,
            handle: Some(handle),
        })
    }

    /// Work through a batch in order. Per-item failures never end the batch.
    pub async fn run(&self, request: PreloadRequest) -> PreloadOutcome {
        let cache_config = self.store.config();
        let pause = self.config.pause_for(&request.context);
        let total = request.ids.len();
        let mut outcome = PreloadOutcome::default();

        for (index, id) in request.ids.iter().enumerate() {
            if let (true, Some(expected)) = (
                request.context.follows_playback(),
                request.current_track_id.as_deref(),
            ) {
                match self
                    .store
                    .current_track_within(cache_config.preload_check_timeout)
                    .await
                {
                    Ok(Some(playing)) if playing.track_id != expected => {
                        info!(
                            expected = %expected,
                            playing = %playing.track_id,
                            remaining = total - index,
                            "Playing track changed, stopping preload"
                        );
                        outcome.aborted = true;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(media_id = %id, error = %e, "Could not check playing track, skipping");
                        outcome.lock_skipped += 1;
                        continue;
                    }
                }
            }

            match self
                .store
                .get_fresh_within(
                    id,
                    cache_config.preload_fresh_threshold,
                    cache_config.preload_check_timeout,
                )
                .await
            {
                Ok(Some(_)) => {
                    debug!(media_id = %id, "Already cached, skipping");
                    outcome.skipped_fresh += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(media_id = %id, error = %e, "Could not check cache, skipping");
                    outcome.lock_skipped += 1;
                    continue;
                }
            }

            debug!(
                media_id = %id,
                position = index + 1,
                total,
                context = %request.context,
                "Preloading track"
            );

            match self.resolver.resolve(id).await {
                Ok(result) => {
                    let entry = CacheEntry::from_resolution(id.as_str(), &result, self.store.now())
                        .into_preloaded(request.context.clone());
                    match self
                        .store
                        .put_within(entry, cache_config.preload_write_timeout)
                        .await
                    {
                        Ok(()) => {
                            outcome.resolved += 1;
                            debug!(media_id = %id, url = %redact_url(&result.direct_url), "Preloaded");
                        }
                        Err(e) => {
                            outcome.failed += 1;
                            warn!(media_id = %id, error = %e, "Could not store preloaded URL");
                        }
                    }
                }
                Err(e) => {
                    outcome.failed += 1;
                    warn!(media_id = %id, error = %e, "Preload resolution failed");
                }
            }

            if !pause.is_zero() {
                sleep(pause).await;
            }
        }

        info!(
            context = %request.context,
            resolved = outcome.resolved,
            failed = outcome.failed,
            skipped_fresh = outcome.skipped_fresh,
            aborted = outcome.aborted,
            "Preload batch finished"
        );

        outcome
    }
}
