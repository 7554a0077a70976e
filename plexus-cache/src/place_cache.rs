//! Place set and per-place scoped model listings.
//!
//! The place cache maintains the list of places visible to the configured
//! scopes and, for each configured place, a live listing of the model
//! manifests under that place's watched paths. Reads are served from cache
//! while fresh; a miss or expired entry triggers a single-flighted remote
//! fetch. A transient fetch failure falls back to the last-known value when
//! one exists; staleness is logged, not escalated.

use crate::entry::CacheEntry;
use crate::flight::Flight;
use crate::scope::ScopeSet;
use crate::stats::{CacheStats, CacheStatsSnapshot};
use dashmap::DashMap;
use futures::future::try_join_all;
use parking_lot::RwLock;
use plexus_core::{Error, MirrorConfig, ModelId, ModelManifest, Place, PlaceId, RemoteRepository, Result};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Callback fired when a listing replacement drops model ids that were
/// present in the prior listing. The facade wires this to manifest-cache
/// eviction so upstream deletions are removed eagerly.
pub type EvictionHook = Arc<dyn Fn(PlaceId, Vec<ModelId>) + Send + Sync>;

/// Cache of places and their scoped model listings.
pub struct PlaceCache {
    remote: Arc<dyn RemoteRepository>,
    scopes: ScopeSet,
    ttl: Duration,
    fetch_timeout: Duration,

    /// The filtered place set; a single entry refreshed wholesale.
    places: RwLock<Option<CacheEntry<Vec<Place>>>>,

    /// Per-place scoped listings.
    listings: DashMap<PlaceId, CacheEntry<Vec<ModelManifest>>>,

    place_flight: Flight<(), Arc<Vec<Place>>>,
    listing_flight: Flight<PlaceId, Arc<Vec<ModelManifest>>>,

    eviction_hook: RwLock<Option<EvictionHook>>,
    stats: CacheStats,
}

impl PlaceCache {
    /// Create a place cache over a remote repository and resolved scopes.
    pub fn new(remote: Arc<dyn RemoteRepository>, scopes: ScopeSet, config: &MirrorConfig) -> Self {
        Self {
            remote,
            scopes,
            ttl: config.place_ttl,
            fetch_timeout: config.fetch_timeout,
            places: RwLock::new(None),
            listings: DashMap::new(),
            place_flight: Flight::new(),
            listing_flight: Flight::new(),
            eviction_hook: RwLock::new(None),
            stats: CacheStats::new(),
        }
    }

    /// The scopes this cache watches.
    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// Register the eviction hook fired for vanished model ids.
    pub fn set_eviction_hook(&self, hook: EvictionHook) {
        *self.eviction_hook.write() = Some(hook);
    }

    /// All places visible to the configured scopes.
    ///
    /// On a miss the full remote place list is fetched and filtered to the
    /// configured place ids. A transient failure serves the last-known
    /// value when one exists and surfaces `RemoteUnavailable` otherwise.
    pub async fn places(&self) -> Result<Arc<Vec<Place>>> {
        {
            let guard = self.places.read();
            if let Some(entry) = guard.as_ref() {
                if entry.is_fresh(self.ttl) {
                    self.stats.record_hit();
                    return Ok(entry.value());
                }
            }
        }

        self.stats.record_miss();
        let fetched = self.place_flight.run((), || self.fetch_places()).await;

        match fetched {
            Ok(value) => Ok(value),
            Err(err) if err.is_transient() => {
                let guard = self.places.read();
                match guard.as_ref() {
                    Some(entry) => {
                        warn!(age_secs = entry.age().as_secs(), %err,
                              "place fetch failed, serving stale place set");
                        self.stats.record_stale_serve();
                        Ok(entry.value())
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// The live scoped listing for one configured place.
    pub async fn listing(&self, place: PlaceId) -> Result<Arc<Vec<ModelManifest>>> {
        if !self.scopes.contains(place) {
            return Err(Error::not_found("configured place", place));
        }

        {
            if let Some(entry) = self.listings.get(&place) {
                if entry.is_fresh(self.ttl) {
                    self.stats.record_hit();
                    return Ok(CacheEntry::value(&entry));
                }
            }
        }

        self.stats.record_miss();
        let fetched = self
            .listing_flight
            .run(place, || self.fetch_listing(place))
            .await;

        match fetched {
            Ok(value) => Ok(value),
            Err(err) if err.is_transient() => match self.listings.get(&place) {
                Some(entry) => {
                    warn!(%place, age_secs = entry.age().as_secs(), %err,
                          "listing fetch failed, serving stale listing");
                    self.stats.record_stale_serve();
                    Ok(CacheEntry::value(&entry))
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Force a re-fetch of one place's scoped listing, bypassing the TTL.
    ///
    /// Concurrent refreshes for the same place coalesce into one remote
    /// call, so an event burst does not hammer the upstream system.
    pub async fn refresh(&self, place: PlaceId) -> Result<Arc<Vec<ModelManifest>>> {
        if !self.scopes.contains(place) {
            return Err(Error::not_found("configured place", place));
        }
        self.listing_flight
            .run(place, || self.fetch_listing(place))
            .await
    }

    /// Drop the cached listing for one place. Absent keys are a no-op.
    pub fn invalidate(&self, place: PlaceId) {
        if self.listings.remove(&place).is_some() {
            debug!(%place, "invalidated place listing");
            self.stats.record_eviction();
        }
    }

    /// Drop the cached place set.
    pub fn invalidate_places(&self) {
        if self.places.write().take().is_some() {
            debug!("invalidated place set");
            self.stats.record_eviction();
        }
    }

    /// Point-in-time cache statistics.
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    async fn fetch_places(&self) -> Result<Arc<Vec<Place>>> {
        let all = self
            .bounded(self.remote.list_places(), "list_places")
            .await?;
        let visible: Vec<Place> = all
            .into_iter()
            .filter(|place| self.scopes.contains(place.id))
            .collect();
        debug!(count = visible.len(), "refreshed place set");

        let entry = CacheEntry::new(visible);
        let value = entry.value();
        *self.places.write() = Some(entry);
        self.stats.record_refresh();
        Ok(value)
    }

    /// Fetch the union of the place's configured paths, replace the cached
    /// listing, and fire the eviction hook for model ids that vanished.
    async fn fetch_listing(&self, place: PlaceId) -> Result<Arc<Vec<ModelManifest>>> {
        let Some(paths) = self.scopes.paths(place) else {
            return Err(Error::not_found("configured place", place));
        };

        let fetches = paths
            .iter()
            .map(|path| self.bounded(self.remote.list_models(place, path), "list_models"));
        let per_path = try_join_all(fetches).await?;

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for manifest in per_path.into_iter().flatten() {
            if seen.insert(manifest.id) {
                merged.push(manifest);
            }
        }
        debug!(%place, count = merged.len(), "refreshed scoped listing");

        let entry = CacheEntry::new(merged);
        let value = entry.value();
        let previous = self.listings.insert(place, entry);
        self.stats.record_refresh();

        if let Some(previous) = previous {
            let vanished: Vec<ModelId> = previous
                .value()
                .iter()
                .map(|m| m.id)
                .filter(|id| !seen.contains(id))
                .collect();
            if !vanished.is_empty() {
                debug!(%place, count = vanished.len(), "models vanished from listing");
                let hook = self.eviction_hook.read().clone();
                if let Some(hook) = hook {
                    hook(place, vanished);
                }
            }
        }

        Ok(value)
    }

    /// Bound a remote call by the configured fetch timeout.
    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>, what: &str) -> Result<T> {
        match tokio::time::timeout(self.fetch_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(what)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{manifest, FakeRemote};
    use parking_lot::Mutex;
    use plexus_core::PlaceKind;
    use tokio::time::sleep;

    fn config() -> MirrorConfig {
        MirrorConfig::new()
            .with_place_ttl(Duration::from_secs(60))
            .with_fetch_timeout(Duration::from_secs(1))
    }

    fn cache_over(
        remote: Arc<FakeRemote>,
        scopes: &str,
        config: &MirrorConfig,
    ) -> PlaceCache {
        PlaceCache::new(remote, ScopeSet::parse(scopes), config)
    }

    #[tokio::test]
    async fn test_places_filtered_to_configured_scopes() {
        let remote = Arc::new(FakeRemote::new());
        let configured = PlaceId::new();
        let unconfigured = PlaceId::new();
        remote.add_place(Place::new(configured, "kept", PlaceKind::Space));
        remote.add_place(Place::new(unconfigured, "dropped", PlaceKind::Space));

        let cache = cache_over(Arc::clone(&remote), &configured.to_string(), &config());
        let places = cache.places().await.unwrap();

        assert_eq!(places.len(), 1);
        assert_eq!(places[0].id, configured);
    }

    #[tokio::test]
    async fn test_places_served_from_cache_while_fresh() {
        let remote = Arc::new(FakeRemote::new());
        let p = PlaceId::new();
        remote.add_place(Place::new(p, "p", PlaceKind::Project));

        let cache = cache_over(Arc::clone(&remote), &p.to_string(), &config());
        cache.places().await.unwrap();
        cache.places().await.unwrap();

        assert_eq!(remote.list_places_calls(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_listing_merges_paths_and_dedups() {
        let remote = Arc::new(FakeRemote::new());
        let p = PlaceId::new();
        let shared = manifest(ModelId::new(), "shared");
        let only_a = manifest(ModelId::new(), "a");
        remote.set_models(p, "a", vec![shared.clone(), only_a.clone()]);
        remote.set_models(p, "b", vec![shared.clone()]);

        let cache = cache_over(Arc::clone(&remote), &format!("{p}/a,{p}/b"), &config());
        let listing = cache.listing(p).await.unwrap();

        assert_eq!(listing.len(), 2);
        assert_eq!(remote.list_models_calls(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_place_is_not_fetched() {
        let remote = Arc::new(FakeRemote::new());
        let cache = cache_over(Arc::clone(&remote), &PlaceId::new().to_string(), &config());

        let err = cache.listing(PlaceId::new()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(remote.list_models_calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_listing_refetches() {
        let remote = Arc::new(FakeRemote::new());
        let p = PlaceId::new();
        remote.set_models(p, "/", vec![manifest(ModelId::new(), "m")]);

        let config = config().with_place_ttl(Duration::from_millis(20));
        let cache = cache_over(Arc::clone(&remote), &p.to_string(), &config);

        cache.listing(p).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        cache.listing(p).await.unwrap();

        assert_eq!(remote.list_models_calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_listing_served_on_transient_failure() {
        let remote = Arc::new(FakeRemote::new());
        let p = PlaceId::new();
        let m = manifest(ModelId::new(), "m");
        remote.set_models(p, "/", vec![m.clone()]);

        let config = config().with_place_ttl(Duration::from_millis(20));
        let cache = cache_over(Arc::clone(&remote), &p.to_string(), &config);

        let first = cache.listing(p).await.unwrap();
        assert_eq!(first.len(), 1);

        sleep(Duration::from_millis(50)).await;
        remote.set_failing(true);

        let stale = cache.listing(p).await.unwrap();
        assert_eq!(stale[0].id, m.id);
        assert_eq!(cache.stats().stale_serves, 1);
    }

    #[tokio::test]
    async fn test_cold_failure_surfaces_remote_unavailable() {
        let remote = Arc::new(FakeRemote::new());
        let p = PlaceId::new();
        remote.set_failing(true);

        let cache = cache_over(Arc::clone(&remote), &p.to_string(), &config());
        let err = cache.listing(p).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_concurrent_reads_single_flight() {
        let remote = Arc::new(FakeRemote::new().with_delay(Duration::from_millis(50)));
        let p = PlaceId::new();
        remote.set_models(p, "/", vec![manifest(ModelId::new(), "m")]);

        let cache = Arc::new(cache_over(Arc::clone(&remote), &p.to_string(), &config()));

        let mut handles = vec![];
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.listing(p).await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().len(), 1);
        }

        // one configured path, so exactly one remote call for the burst
        assert_eq!(remote.list_models_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_absent_key_is_noop() {
        let remote = Arc::new(FakeRemote::new());
        let cache = cache_over(remote, &PlaceId::new().to_string(), &config());

        cache.invalidate(PlaceId::new());
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let remote = Arc::new(FakeRemote::new());
        let p = PlaceId::new();
        remote.set_models(p, "/", vec![manifest(ModelId::new(), "m")]);

        let cache = cache_over(Arc::clone(&remote), &p.to_string(), &config());
        cache.listing(p).await.unwrap();
        cache.invalidate(p);
        cache.listing(p).await.unwrap();

        assert_eq!(remote.list_models_calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_bypasses_ttl() {
        let remote = Arc::new(FakeRemote::new());
        let p = PlaceId::new();
        remote.set_models(p, "/", vec![manifest(ModelId::new(), "m")]);

        let cache = cache_over(Arc::clone(&remote), &p.to_string(), &config());
        cache.listing(p).await.unwrap();
        cache.refresh(p).await.unwrap();

        assert_eq!(remote.list_models_calls(), 2);
    }

    #[tokio::test]
    async fn test_eviction_hook_fires_for_vanished_models() {
        let remote = Arc::new(FakeRemote::new());
        let p = PlaceId::new();
        let kept = manifest(ModelId::new(), "kept");
        let dropped = manifest(ModelId::new(), "dropped");
        remote.set_models(p, "/", vec![kept.clone(), dropped.clone()]);

        let cache = cache_over(Arc::clone(&remote), &p.to_string(), &config());
        let vanished: Arc<Mutex<Vec<ModelId>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let vanished = Arc::clone(&vanished);
            cache.set_eviction_hook(Arc::new(move |_, ids| {
                vanished.lock().extend(ids);
            }));
        }

        cache.listing(p).await.unwrap();
        remote.set_models(p, "/", vec![kept.clone()]);
        cache.refresh(p).await.unwrap();

        assert_eq!(vanished.lock().as_slice(), &[dropped.id]);
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_a_transient_failure() {
        let remote = Arc::new(FakeRemote::new().with_delay(Duration::from_millis(200)));
        let p = PlaceId::new();
        remote.set_models(p, "/", vec![manifest(ModelId::new(), "m")]);

        let config = config().with_fetch_timeout(Duration::from_millis(20));
        let cache = cache_over(Arc::clone(&remote), &p.to_string(), &config);

        let err = cache.listing(p).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.is_transient());
    }
}
