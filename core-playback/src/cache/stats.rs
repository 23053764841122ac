//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};

/// Snapshot of the cache population.
///
/// Every entry lands in exactly one bucket, checked in this order:
/// expired, preloaded, used, fresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    /// Total number of entries
    pub total: usize,

    /// Entries older than the global expiry
    pub expired: usize,

    /// Preloaded and not served yet
    pub preloaded: usize,

    /// Served at least once
    pub used: usize,

    /// Neither preloaded nor used, and not expired
    pub fresh: usize,
}

impl CacheInfo {
    /// Entries that can still be served.
    pub fn live(&self) -> usize {
        self.total - self.expired
    }

    /// Share of live entries that came from preloading, in percent.
    pub fn preload_share(&self) -> f64 {
        let live = self.live();
        if live == 0 {
            return 0.0;
        }

        (self.preloaded as f64 / live as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_and_share() {
        let info = CacheInfo {
            total: 10,
            expired: 2,
            preloaded: 4,
            used: 3,
            fresh: 1,
        };
        assert_eq!(info.live(), 8);
        assert_eq!(info.preload_share(), 50.0);
        assert_eq!(CacheInfo::default().preload_share(), 0.0);
    }
}
