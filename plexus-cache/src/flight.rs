//! Single-flight discipline for keyed remote fetches.
//!
//! At most one fetch per key is in flight at any time. The first caller
//! for a key becomes the leader and executes the fetch; concurrent callers
//! for the same key become followers and wait for the leader's result.
//! Every caller receives the same value or the same failure.
//!
//! # Cancellation
//!
//! If the leader task is cancelled mid-fetch, followers would wait
//! forever. Callers bound each fetch with a timeout before handing it to
//! [`Flight::run`], so the leader future always completes.

use parking_lot::Mutex;
use plexus_core::Result;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Notify, OnceCell};
use tracing::trace;

/// Result slot and wakeup for one in-flight fetch.
struct Waiter<V> {
    result: OnceCell<Result<V>>,
    notify: Notify,
}

/// Per-key fetch coalescing.
///
/// Keys fetch independently: two different keys run their fetches in
/// parallel, while concurrent calls for one key collapse into a single
/// remote call.
pub struct Flight<K, V> {
    in_flight: Mutex<HashMap<K, Arc<Waiter<V>>>>,
}

impl<K, V> Flight<K, V>
where
    K: Hash + Eq + Clone + Send,
    V: Clone + Send,
{
    /// Create a new flight group.
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `fetch` for `key`, coalescing with any in-flight call.
    ///
    /// The leader executes `fetch`; followers wait and receive a clone of
    /// the leader's result. The in-flight entry is removed once the leader
    /// completes, so a later call starts a fresh fetch.
    pub async fn run<F, Fut>(&self, key: K, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let (waiter, is_leader) = {
            let mut map = self.in_flight.lock();
            if let Some(waiter) = map.get(&key) {
                (Arc::clone(waiter), false)
            } else {
                let waiter = Arc::new(Waiter {
                    result: OnceCell::new(),
                    notify: Notify::new(),
                });
                map.insert(key.clone(), Arc::clone(&waiter));
                (waiter, true)
            }
        };

        if is_leader {
            let result = fetch().await;

            // Publish before removing the entry so followers that arrived
            // while the fetch ran always find a result.
            let _ = waiter.result.set(result.clone());
            waiter.notify.notify_waiters();
            self.in_flight.lock().remove(&key);

            result
        } else {
            trace!("joining in-flight fetch");
            loop {
                // Register for the wakeup before checking the slot to
                // close the race with the leader publishing in between.
                let notified = waiter.notify.notified();
                if let Some(result) = waiter.result.get() {
                    return result.clone();
                }
                notified.await;
            }
        }
    }

    /// Number of fetches currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl<K, V> Default for Flight<K, V>
where
    K: Hash + Eq + Clone + Send,
    V: Clone + Send,
{
    fn default() -> Self {
        Self::new()
    }
}
