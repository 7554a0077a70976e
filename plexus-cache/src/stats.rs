//! Cache statistics counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared counters tracking cache behavior.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    refreshes: Arc<AtomicU64>,
    stale_serves: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_serve(&self) {
        self.stale_serves.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view of the counters.
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        CacheStatsSnapshot {
            hits,
            misses,
            refreshes: self.refreshes.load(Ordering::Relaxed),
            stale_serves: self.stale_serves.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate,
        }
    }
}

/// Snapshot of cache statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStatsSnapshot {
    /// Reads served from a fresh cached value
    pub hits: u64,
    /// Reads that had to fetch (cold or expired)
    pub misses: u64,
    /// Fetches that replaced an entry (lazy, forced, or scheduled)
    pub refreshes: u64,
    /// Reads served from a stale value after a transient fetch failure
    pub stale_serves: u64,
    /// Entries removed by invalidation or cascade
    pub evictions: u64,
    /// hits / (hits + misses), 0.0 when no reads happened
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();

        let snap = stats.snapshot();
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.misses, 1);
        assert!((snap.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = CacheStats::new().snapshot();
        assert_eq!(snap.hit_rate, 0.0);
        assert_eq!(snap.evictions, 0);
    }
}
