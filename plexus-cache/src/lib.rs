//! Place/model caching and invalidation for the plexus catalog mirror.
//!
//! This crate is the core of the integration layer: a two-level cache
//! (places → model manifests) that stays consistent with the remote system
//! of record under concurrent reads, periodic full refreshes, and
//! asynchronous push invalidation.
//!
//! # Architecture
//!
//! - [`ScopeSet`]: parsed `placeId/path` scope configuration
//! - [`PlaceCache`]: place set and per-place scoped model listings
//! - [`ModelManifestCache`]: individual manifests keyed by model identity
//! - [`EventDispatcher`]: push notifications → targeted invalidations
//! - [`CatalogMirror`]: wires the components and owns the refresh schedule
//!
//! The two caches are siblings rather than nested because their
//! invalidation granularity differs: a place-level re-index must not
//! discard unaffected manifests, and a model-level write must not force a
//! whole-place refetch.
//!
//! Every cache read that misses or has expired is single-flighted per key:
//! concurrent callers share one remote fetch and receive the same value or
//! the same failure.

pub mod dispatcher;
pub mod entry;
pub mod flight;
pub mod manifest_cache;
pub mod mirror;
pub mod place_cache;
pub mod scope;
pub mod stats;
pub mod testing;

pub use dispatcher::{EventData, EventDispatcher, ModelChange, PushEvent};
pub use entry::CacheEntry;
pub use flight::Flight;
pub use manifest_cache::ModelManifestCache;
pub use mirror::CatalogMirror;
pub use place_cache::{EvictionHook, PlaceCache};
pub use scope::ScopeSet;
pub use stats::{CacheStats, CacheStatsSnapshot};
