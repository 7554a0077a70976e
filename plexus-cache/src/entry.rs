//! Cache entry wrapper: a value plus its fetch timestamp.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cached value and when it was fetched.
///
/// Freshness is judged lazily at read time against the caller's TTL; there
/// is no background sweep. The value sits behind an `Arc`, so replacing an
/// entry swaps the whole value at once: readers observe either the old or
/// the new value, never a partial update.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    value: Arc<T>,
    fetched_at: Instant,
}

impl<T> CacheEntry<T> {
    /// Wrap a freshly fetched value.
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(value),
            fetched_at: Instant::now(),
        }
    }

    /// Shared handle to the cached value.
    pub fn value(&self) -> Arc<T> {
        Arc::clone(&self.value)
    }

    /// Time since the value was fetched.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// Whether the entry is within its freshness window.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() <= ttl
    }
}
