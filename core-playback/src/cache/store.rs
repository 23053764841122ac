//! Shared resolution cache and playback signal.
//!
//! One [`BoundedMutex`] guards the entry map, the currently playing track and
//! the queued set together. Nothing slow ever runs under it: resolution and
//! network I/O happen outside, only lookups, flag flips and writes are locked.

use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use core_async::sync::{BoundedMutex, BoundedMutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::config::CacheConfig;
use super::entry::CacheEntry;
use super::stats::CacheInfo;
use crate::error::Result;

/// The track the client reports as playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTrack {
    pub platform: String,
    pub track_id: String,
}

/// Everything behind the cache lock.
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    pub(crate) entries: HashMap<String, CacheEntry>,
    pub(crate) current: Option<CurrentTrack>,
    pub(crate) queued: HashSet<String>,
}

/// In-memory cache of resolved URLs keyed by media ID.
pub struct CacheStore {
    state: BoundedMutex<SharedState>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: BoundedMutex::new("cache", SharedState::default()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) async fn lock_within(
        &self,
        bound: Duration,
    ) -> Result<BoundedMutexGuard<'_, SharedState>> {
        Ok(self.state.lock_timeout(bound).await?)
    }

    async fn lock(&self) -> Result<BoundedMutexGuard<'_, SharedState>> {
        self.lock_within(self.config.lock_timeout).await
    }

    // ========================================================================
    // Entries
    // ========================================================================

    /// Entry for `media_id` regardless of age.
    pub async fn get(&self, media_id: &str) -> Result<Option<CacheEntry>> {
        let state = self.lock().await?;
        Ok(state.entries.get(media_id).cloned())
    }

    /// Entry for `media_id` if it is younger than `threshold` capped by the
    /// global expiry.
    pub async fn get_fresh(
        &self,
        media_id: &str,
        threshold: Duration,
    ) -> Result<Option<CacheEntry>> {
        self.get_fresh_within(media_id, threshold, self.config.lock_timeout)
            .await
    }

    /// [`get_fresh`](Self::get_fresh) with an explicit lock bound.
    pub async fn get_fresh_within(
        &self,
        media_id: &str,
        threshold: Duration,
        bound: Duration,
    ) -> Result<Option<CacheEntry>> {
        let now = self.now();
        let threshold = self.config.effective_threshold(threshold);
        let state = self.lock_within(bound).await?;
        Ok(state
            .entries
            .get(media_id)
            .filter(|entry| entry.is_younger_than(now, threshold))
            .cloned())
    }

    /// Insert or replace the entry for `entry.media_id`.
    pub async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.put_within(entry, self.config.lock_timeout).await
    }

    /// [`put`](Self::put) with an explicit lock bound.
    ///
    /// `resolved_at` never moves backwards for an ID: an overwrite carrying an
    /// older timestamp takes over the previous one.
    pub async fn put_within(&self, mut entry: CacheEntry, bound: Duration) -> Result<()> {
        let mut state = self.lock_within(bound).await?;
        if let Some(previous) = state.entries.get(&entry.media_id) {
            if previous.resolved_at > entry.resolved_at {
                entry.resolved_at = previous.resolved_at;
            }
        }
        state.entries.insert(entry.media_id.clone(), entry);
        Ok(())
    }

    /// Remove every entry, returning how many were removed.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<usize> {
        let cleared = {
            let mut state = self.lock().await?;
            let cleared = state.entries.len();
            state.entries.clear();
            cleared
        };
        info!(cleared, "Cache cleared");
        Ok(cleared)
    }

    pub async fn size(&self) -> Result<usize> {
        Ok(self.lock().await?.entries.len())
    }

    /// Split `ids` into those needing resolution and those already fresh
    /// under `threshold`. Order is preserved within each half.
    pub async fn partition_fresh(
        &self,
        ids: &[String],
        threshold: Duration,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let now = self.now();
        let threshold = self.config.effective_threshold(threshold);
        let state = self.lock().await?;

        let (cached, needed): (Vec<String>, Vec<String>) =
            ids.iter().cloned().partition(|id| {
                state
                    .entries
                    .get(id)
                    .is_some_and(|entry| entry.is_younger_than(now, threshold))
            });

        Ok((needed, cached))
    }

    /// Look up a serve-fresh entry and mark it served in the same critical
    /// section.
    ///
    /// Returns the entry as it was before the flip, so callers can tell a
    /// preloaded hit from a plain one.
    pub async fn take_for_serve(&self, media_id: &str) -> Result<Option<CacheEntry>> {
        let now = self.now();
        let threshold = self
            .config
            .effective_threshold(self.config.serve_fresh_threshold);
        let mut state = self.lock().await?;

        let Some(entry) = state.entries.get_mut(media_id) else {
            return Ok(None);
        };
        if !entry.is_younger_than(now, threshold) {
            debug!(media_id = %media_id, age_ms = entry.age_millis(now), "Cached entry is stale");
            return Ok(None);
        }

        let before = entry.clone();
        entry.mark_served();
        Ok(Some(before))
    }

    /// Population snapshot for monitoring.
    pub async fn info(&self) -> Result<CacheInfo> {
        let now = self.now();
        let state = self.lock().await?;

        let mut info = CacheInfo {
            total: state.entries.len(),
            ..CacheInfo::default()
        };
        for entry in state.entries.values() {
            if entry.is_older_than(now, self.config.expiry) {
                info.expired += 1;
            } else if entry.preloaded {
                info.preloaded += 1;
            } else if entry.used {
                info.used += 1;
            } else {
                info.fresh += 1;
            }
        }
        Ok(info)
    }

    // ========================================================================
    // Playback signal
    // ========================================================================

    /// Record the playing track. Last write wins.
    pub async fn set_current_track(
        &self,
        platform: impl Into<String>,
        track_id: impl Into<String>,
    ) -> Result<CurrentTrack> {
        let track = CurrentTrack {
            platform: platform.into(),
            track_id: track_id.into(),
        };
        self.lock().await?.current = Some(track.clone());
        debug!(platform = %track.platform, track_id = %track.track_id, "Current track updated");
        Ok(track)
    }

    pub async fn current_track(&self) -> Result<Option<CurrentTrack>> {
        self.current_track_within(self.config.lock_timeout).await
    }

    pub async fn current_track_within(&self, bound: Duration) -> Result<Option<CurrentTrack>> {
        Ok(self.lock_within(bound).await?.current.clone())
    }

    /// Replace the queued set wholesale, returning its new size.
    pub async fn replace_queue<I, S>(&self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queued: HashSet<String> = ids.into_iter().map(Into::into).collect();
        let count = queued.len();
        self.lock().await?.queued = queued;
        Ok(count)
    }

    /// Queued IDs in sorted order.
    pub async fn queued_tracks(&self) -> Result<Vec<String>> {
        let state = self.lock().await?;
        let mut ids: Vec<String> = state.queued.iter().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
