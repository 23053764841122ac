//! # Cache Janitor
//!
//! Periodic sweep that removes entries no longer worth keeping. Each entry
//! falls into exactly one bucket, checked in order:
//!
//! | Bucket             | Condition                               | Action |
//! |--------------------|-----------------------------------------|--------|
//! | `expired`          | age > `expiry`                          | remove |
//! | `unused_preloaded` | `preloaded` and age > `unused_preload_ttl` | remove |
//! | `old_used`         | `used` and age > `used_ttl`             | remove |
//! | `kept`             | anything else                           | keep   |
//!
//! The lock is held only while classifying and removing. Logging happens
//! after it is released.

use chrono::{DateTime, Utc};
use core_async::sync::CancellationToken;
use core_async::task::{self, JoinHandle};
use core_async::time::{interval_at, Instant, MissedTickBehavior};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::config::CacheConfig;
use super::entry::CacheEntry;
use super::store::CacheStore;
use crate::error::Result;

/// Where an entry lands during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepBucket {
    Expired,
    UnusedPreloaded,
    OldUsed,
    Kept,
}

impl SweepBucket {
    pub fn is_removed(self) -> bool {
        !matches!(self, SweepBucket::Kept)
    }
}

/// Classify one entry at `now`.
pub fn classify(entry: &CacheEntry, now: DateTime<Utc>, config: &CacheConfig) -> SweepBucket {
    if entry.is_older_than(now, config.expiry) {
        SweepBucket::Expired
    } else if entry.preloaded && entry.is_older_than(now, config.unused_preload_ttl) {
        SweepBucket::UnusedPreloaded
    } else if entry.used && entry.is_older_than(now, config.used_ttl) {
        SweepBucket::OldUsed
    } else {
        SweepBucket::Kept
    }
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired: usize,
    pub unused_preloaded: usize,
    pub old_used: usize,
    pub kept: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired + self.unused_preloaded + self.old_used
    }

    fn record(&mut self, bucket: SweepBucket) {
        match bucket {
            SweepBucket::Expired => self.expired += 1,
            SweepBucket::UnusedPreloaded => self.unused_preloaded += 1,
            SweepBucket::OldUsed => self.old_used += 1,
            SweepBucket::Kept => self.kept += 1,
        }
    }
}

/// When the next sweep is due, in wall-clock terms.
#[derive(Debug)]
pub struct SweepSchedule {
    interval: Duration,
    next_at: Mutex<DateTime<Utc>>,
}

impl SweepSchedule {
    pub fn new(interval: Duration, started_at: DateTime<Utc>) -> Self {
        Self {
            interval,
            next_at: Mutex::new(one_interval_after(started_at, interval)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record a sweep at `at`; the next one is one interval later.
    pub fn mark_swept(&self, at: DateTime<Utc>) {
        *self.next_at.lock() = one_interval_after(at, self.interval);
    }

    /// Whole seconds until the next sweep, rounded up, never negative.
    pub fn seconds_until_next(&self, now: DateTime<Utc>) -> u64 {
        let remaining_ms = (*self.next_at.lock() - now).num_milliseconds();
        if remaining_ms <= 0 {
            0
        } else {
            (remaining_ms as u64).div_ceil(1000)
        }
    }
}

fn one_interval_after(at: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(interval)
        .ok()
        .and_then(|interval| at.checked_add_signed(interval))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Background sweeper over a [`CacheStore`].
pub struct Janitor {
    store: Arc<CacheStore>,
    schedule: Arc<SweepSchedule>,
}

impl Janitor {
    pub fn new(store: Arc<CacheStore>) -> Self {
        let schedule = Arc::new(SweepSchedule::new(
            store.config().janitor_interval,
            store.now(),
        ));
        Self { store, schedule }
    }

    pub fn schedule(&self) -> Arc<SweepSchedule> {
        Arc::clone(&self.schedule)
    }

    /// Run one sweep now.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepReport> {
        let now = self.store.now();
        let config = self.store.config();
        let mut report = SweepReport::default();

        {
            let mut state = self.store.lock_within(config.lock_timeout).await?;
            state.entries.retain(|_, entry| {
                let bucket = classify(entry, now, config);
                report.record(bucket);
                !bucket.is_removed()
            });
        }

        self.schedule.mark_swept(now);

        if report.removed() > 0 {
            info!(
                expired = report.expired,
                unused_preloaded = report.unused_preloaded,
                old_used = report.old_used,
                kept = report.kept,
                "Cache sweep removed entries"
            );
        } else {
            debug!(kept = report.kept, "Cache sweep found nothing to remove");
        }

        Ok(report)
    }

    /// Sweep every `janitor_interval` until `cancel` fires. The first sweep
    /// happens one interval after start.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        task::spawn(async move { self.run(cancel).await })
    }

    async fn run(&self, cancel: CancellationToken) {
        let period = self.schedule.interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = period.as_secs(), "Cache janitor started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!(error = %e, "Cache sweep failed");
                        self.schedule.mark_swept(self.store.now());
                    }
                }
            }
        }

        info!("Cache janitor stopped");
    }
}
