//! Cache configuration and freshness policy

use std::time::Duration;

/// Configuration for the resolution cache and its janitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Global expiry. No entry older than this is ever served (default: 3600s)
    pub expiry: Duration,

    /// Entries younger than this are not re-resolved by preload (default: 3000s)
    pub preload_fresh_threshold: Duration,

    /// Entries younger than this are reused by the stream server (default: 3600s)
    pub serve_fresh_threshold: Duration,

    /// Preloaded entries never served are dropped after this (default: 1800s)
    pub unused_preload_ttl: Duration,

    /// Served entries are dropped after this (default: 7200s)
    pub used_ttl: Duration,

    /// Period between janitor sweeps (default: same as `expiry`)
    pub janitor_interval: Duration,

    /// Lock bound for general operations (default: 30s)
    pub lock_timeout: Duration,

    /// Lock bound for preload cache and playback checks (default: 2s)
    pub preload_check_timeout: Duration,

    /// Lock bound for preload writes (default: 5s)
    pub preload_write_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(3600),
            preload_fresh_threshold: Duration::from_secs(3000),
            serve_fresh_threshold: Duration::from_secs(3600),
            unused_preload_ttl: Duration::from_secs(1800),
            used_ttl: Duration::from_secs(7200),
            janitor_interval: Duration::from_secs(3600),
            lock_timeout: Duration::from_secs(30),
            preload_check_timeout: Duration::from_secs(2),
            preload_write_timeout: Duration::from_secs(5),
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global expiry. The janitor interval follows it.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self.janitor_interval = expiry;
        self
    }

    pub fn with_preload_fresh_threshold(mut self, threshold: Duration) -> Self {
        self.preload_fresh_threshold = threshold;
        self
    }

    pub fn with_serve_fresh_threshold(mut self, threshold: Duration) -> Self {
        self.serve_fresh_threshold = threshold;
        self
    }

    pub fn with_unused_preload_ttl(mut self, ttl: Duration) -> Self {
        self.unused_preload_ttl = ttl;
        self
    }

    pub fn with_used_ttl(mut self, ttl: Duration) -> Self {
        self.used_ttl = ttl;
        self
    }

    /// Set the sweep period. Must be set after [`with_expiry`](Self::with_expiry)
    /// to take effect.
    pub fn with_janitor_interval(mut self, interval: Duration) -> Self {
        self.janitor_interval = interval;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_preload_check_timeout(mut self, timeout: Duration) -> Self {
        self.preload_check_timeout = timeout;
        self
    }

    pub fn with_preload_write_timeout(mut self, timeout: Duration) -> Self {
        self.preload_write_timeout = timeout;
        self
    }

    /// The effective freshness bound for a consumer threshold.
    pub fn effective_threshold(&self, threshold: Duration) -> Duration {
        threshold.min(self.expiry)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.expiry.is_zero() {
            return Err("expiry must be greater than 0".to_string());
        }

        if self.janitor_interval.is_zero() {
            return Err("janitor_interval must be greater than 0".to_string());
        }

        if self.preload_fresh_threshold.is_zero() || self.serve_fresh_threshold.is_zero() {
            return Err("freshness thresholds must be greater than 0".to_string());
        }

        if self.lock_timeout.is_zero()
            || self.preload_check_timeout.is_zero()
            || self.preload_write_timeout.is_zero()
        {
            return Err("lock timeouts must be greater than 0".to_string());
        }

        Ok(())
    }
}
