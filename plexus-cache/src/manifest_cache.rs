//! Individual model manifests keyed by model identity.
//!
//! The manifest cache sits beside the place cache rather than inside it:
//! a place-level re-index must not discard manifests that are unaffected,
//! and a model-level write must not force a whole-place refetch. Entries
//! are keyed by [`ModelKey`], the model id, optionally qualified by
//! version for historical lookups.

use crate::entry::CacheEntry;
use crate::flight::Flight;
use crate::place_cache::PlaceCache;
use crate::stats::{CacheStats, CacheStatsSnapshot};
use dashmap::DashMap;
use plexus_core::{Error, MirrorConfig, ModelId, ModelKey, ModelManifest, PlaceId, RemoteRepository, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cache of model manifests and their resolved identity.
pub struct ModelManifestCache {
    remote: Arc<dyn RemoteRepository>,
    place_cache: Arc<PlaceCache>,
    ttl: Duration,
    fetch_timeout: Duration,

    manifests: DashMap<ModelKey, CacheEntry<ModelManifest>>,
    flight: Flight<ModelKey, Arc<ModelManifest>>,
    stats: CacheStats,
}

impl ModelManifestCache {
    /// Create a manifest cache over a remote repository and the sibling
    /// place cache used for owner resolution.
    pub fn new(
        remote: Arc<dyn RemoteRepository>,
        place_cache: Arc<PlaceCache>,
        config: &MirrorConfig,
    ) -> Self {
        Self {
            remote,
            place_cache,
            ttl: config.manifest_ttl,
            fetch_timeout: config.fetch_timeout,
            manifests: DashMap::new(),
            flight: Flight::new(),
            stats: CacheStats::new(),
        }
    }

    /// Get a manifest, fetching from the remote system on miss or expiry.
    ///
    /// The owning place is resolved transitively through the place cache
    /// listings (populating them on miss). A transient failure serves a
    /// stale entry when one exists. A remote `NotFound` is authoritative:
    /// any cached entry for the key is evicted and the error surfaces.
    pub async fn get(&self, key: &ModelKey) -> Result<Arc<ModelManifest>> {
        {
            if let Some(entry) = self.manifests.get(key) {
                if entry.is_fresh(self.ttl) {
                    self.stats.record_hit();
                    return Ok(CacheEntry::value(&entry));
                }
            }
        }

        self.stats.record_miss();
        let fetched = self
            .flight
            .run(key.clone(), || self.fetch_manifest(key.clone()))
            .await;

        match fetched {
            Ok(value) => Ok(value),
            Err(err) if err.is_not_found() => {
                if self.manifests.remove(key).is_some() {
                    debug!(%key, "evicting manifest reported absent upstream");
                    self.stats.record_eviction();
                }
                Err(err)
            }
            Err(err) if err.is_transient() => match self.manifests.get(key) {
                Some(entry) => {
                    warn!(%key, age_secs = entry.age().as_secs(), %err,
                          "manifest fetch failed, serving stale manifest");
                    self.stats.record_stale_serve();
                    Ok(CacheEntry::value(&entry))
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Every manifest under one place's scoped listing, resolved through
    /// this cache.
    ///
    /// Misses populate from the listing's own manifests; the listing is
    /// as fresh as a per-model fetch would be, so no extra remote calls
    /// are made here.
    pub async fn all_under_place(&self, place: PlaceId) -> Result<Vec<Arc<ModelManifest>>> {
        let listing = self.place_cache.listing(place).await?;

        let mut resolved = Vec::with_capacity(listing.len());
        for manifest in listing.iter() {
            let key = manifest.key();
            if let Some(entry) = self.manifests.get(&key) {
                if entry.is_fresh(self.ttl) {
                    self.stats.record_hit();
                    resolved.push(CacheEntry::value(&entry));
                    continue;
                }
            }

            self.stats.record_miss();
            let entry = CacheEntry::new(manifest.clone());
            let value = entry.value();
            self.manifests.insert(key, entry);
            self.stats.record_refresh();
            resolved.push(value);
        }
        Ok(resolved)
    }

    /// Remove exactly one entry. Absent keys are a no-op.
    ///
    /// Independent of place-level invalidation: a model write does not
    /// invalidate sibling models in the same place.
    pub fn invalidate(&self, key: &ModelKey) {
        if self.manifests.remove(key).is_some() {
            debug!(%key, "invalidated manifest");
            self.stats.record_eviction();
        }
    }

    /// Remove every entry (head and versioned) for one model id.
    ///
    /// Used by place-refresh cascades when a model vanishes upstream.
    pub fn remove_model(&self, model: ModelId) {
        let before = self.manifests.len();
        self.manifests.retain(|key, _| key.id != model);
        let removed = before - self.manifests.len();
        if removed > 0 {
            debug!(%model, removed, "removed manifests for vanished model");
            for _ in 0..removed {
                self.stats.record_eviction();
            }
        }
    }

    /// Number of cached manifests.
    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    /// Whether the cache holds no manifests.
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Point-in-time cache statistics.
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    async fn fetch_manifest(&self, key: ModelKey) -> Result<Arc<ModelManifest>> {
        let place = self.owner_of(key.id).await?;
        let manifest = self
            .bounded(
                self.remote.fetch_model(place, key.id, key.version.as_deref()),
                "fetch_model",
            )
            .await?;

        let entry = CacheEntry::new(manifest);
        let value = entry.value();
        self.manifests.insert(key, entry);
        self.stats.record_refresh();
        Ok(value)
    }

    /// Resolve the place owning a model by scanning the configured
    /// listings, populating them on miss.
    ///
    /// A listing that cannot be read does not let us claim the model
    /// absent: if the scan saw any transient failure, that failure
    /// surfaces instead of `NotFound`.
    async fn owner_of(&self, model: ModelId) -> Result<PlaceId> {
        let mut last_failure: Option<Error> = None;

        for place in self.place_cache.scopes().places() {
            match self.place_cache.listing(place).await {
                Ok(listing) => {
                    if listing.iter().any(|m| m.id == model) {
                        return Ok(place);
                    }
                }
                Err(err) if err.is_transient() => {
                    warn!(%place, %err, "skipping unreadable listing during owner resolution");
                    last_failure = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        match last_failure {
            Some(err) => Err(err),
            None => Err(Error::not_found("model", model)),
        }
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
    use crate::scope::ScopeSet;
    use crate::testing::{manifest, FakeRemote};

    fn config() -> MirrorConfig {
        MirrorConfig::new()
            .with_place_ttl(Duration::from_secs(60))
            .with_manifest_ttl(Duration::from_secs(60))
            .with_fetch_timeout(Duration::from_secs(1))
    }

    fn caches(
        remote: Arc<FakeRemote>,
        scopes: &str,
        config: &MirrorConfig,
    ) -> (Arc<PlaceCache>, ModelManifestCache) {
        let place_cache = Arc::new(PlaceCache::new(
            Arc::clone(&remote) as Arc<dyn RemoteRepository>,
            ScopeSet::parse(scopes),
            config,
        ));
        let manifest_cache =
            ModelManifestCache::new(remote, Arc::clone(&place_cache), config);
        (place_cache, manifest_cache)
    }

    #[tokio::test]
    async fn test_get_resolves_owner_and_fetches() {
        let remote = Arc::new(FakeRemote::new());
        let place = PlaceId::new();
        let m = manifest(ModelId::new(), "loan");
        remote.set_models(place, "/", vec![m.clone()]);

        let (_, cache) = caches(Arc::clone(&remote), &place.to_string(), &config());
        let fetched = cache.get(&m.key()).await.unwrap();

        assert_eq!(fetched.id, m.id);
        assert_eq!(remote.fetch_model_calls(), 1);
    }

    #[tokio::test]
    async fn test_get_served_from_cache_while_fresh() {
        let remote = Arc::new(FakeRemote::new());
        let place = PlaceId::new();
        let m = manifest(ModelId::new(), "loan");
        remote.set_models(place, "/", vec![m.clone()]);

        let (_, cache) = caches(Arc::clone(&remote), &place.to_string(), &config());
        cache.get(&m.key()).await.unwrap();
        cache.get(&m.key()).await.unwrap();

        assert_eq!(remote.fetch_model_calls(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_versioned_lookup_is_a_distinct_entry() {
        let remote = Arc::new(FakeRemote::new());
        let place = PlaceId::new();
        let id = ModelId::new();
        let mut v1 = manifest(id, "loan");
        v1.version = "1".to_string();
        let mut v2 = manifest(id, "loan");
        v2.version = "2".to_string();
        remote.set_models(place, "/", vec![v1.clone(), v2.clone()]);

        let (_, cache) = caches(Arc::clone(&remote), &place.to_string(), &config());

        let head = cache.get(&ModelKey::new(id)).await.unwrap();
        let pinned = cache.get(&ModelKey::versioned(id, "2")).await.unwrap();

        assert_eq!(head.version, "1");
        assert_eq!(pinned.version, "2");
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_model_surfaces_not_found() {
        let remote = Arc::new(FakeRemote::new());
        let place = PlaceId::new();
        remote.set_models(place, "/", vec![]);

        let (_, cache) = caches(Arc::clone(&remote), &place.to_string(), &config());
        let err = cache.get(&ModelKey::new(ModelId::new())).await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_not_found_evicts_cached_entry() {
        let remote = Arc::new(FakeRemote::new());
        let place = PlaceId::new();
        let m = manifest(ModelId::new(), "loan");
        remote.set_models(place, "/", vec![m.clone()]);

        let config = config().with_manifest_ttl(Duration::from_millis(10));
        let (_, cache) = caches(Arc::clone(&remote), &place.to_string(), &config);

        cache.get(&m.key()).await.unwrap();
        assert_eq!(cache.len(), 1);

        // model disappears upstream; the still-fresh listing resolves the
        // owner but the per-model fetch reports authoritative absence
        remote.set_models(place, "/", vec![]);
        tokio::time::sleep(Duration::from_millis(30)).await;

        let err = cache.get(&m.key()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_stale_served_on_transient_failure() {
        let remote = Arc::new(FakeRemote::new());
        let place = PlaceId::new();
        let m = manifest(ModelId::new(), "loan");
        remote.set_models(place, "/", vec![m.clone()]);

        let config = config().with_manifest_ttl(Duration::from_millis(10));
        let (_, cache) = caches(Arc::clone(&remote), &place.to_string(), &config);

        cache.get(&m.key()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        remote.set_failing(true);

        let stale = cache.get(&m.key()).await.unwrap();
        assert_eq!(stale.id, m.id);
        assert_eq!(cache.stats().stale_serves, 1);
    }

    #[tokio::test]
    async fn test_invalidate_removes_exactly_one_key() {
        let remote = Arc::new(FakeRemote::new());
        let place = PlaceId::new();
        let kept = manifest(ModelId::new(), "kept");
        let dropped = manifest(ModelId::new(), "dropped");
        remote.set_models(place, "/", vec![kept.clone(), dropped.clone()]);

        let (_, cache) = caches(Arc::clone(&remote), &place.to_string(), &config());
        cache.get(&kept.key()).await.unwrap();
        cache.get(&dropped.key()).await.unwrap();

        cache.invalidate(&dropped.key());

        assert_eq!(cache.len(), 1);
        // sibling stays cached: no further remote call for it
        cache.get(&kept.key()).await.unwrap();
        assert_eq!(remote.fetch_model_calls(), 2);
        // the invalidated model refetches exactly once
        cache.get(&dropped.key()).await.unwrap();
        assert_eq!(remote.fetch_model_calls(), 3);
    }

    #[tokio::test]
    async fn test_invalidate_absent_key_is_noop() {
        let remote = Arc::new(FakeRemote::new());
        let (_, cache) = caches(remote, &PlaceId::new().to_string(), &config());

        cache.invalidate(&ModelKey::new(ModelId::new()));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test]
    async fn test_remove_model_clears_all_versions() {
        let remote = Arc::new(FakeRemote::new());
        let place = PlaceId::new();
        let id = ModelId::new();
        let mut v1 = manifest(id, "loan");
        v1.version = "1".to_string();
        let mut v2 = manifest(id, "loan");
        v2.version = "2".to_string();
        let other = manifest(ModelId::new(), "other");
        remote.set_models(place, "/", vec![v1, v2, other.clone()]);

        let (_, cache) = caches(Arc::clone(&remote), &place.to_string(), &config());
        cache.get(&ModelKey::new(id)).await.unwrap();
        cache.get(&ModelKey::versioned(id, "2")).await.unwrap();
        cache.get(&other.key()).await.unwrap();
        assert_eq!(cache.len(), 3);

        cache.remove_model(id);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 2);
    }

    #[tokio::test]
    async fn test_all_under_place_populates_from_listing() {
        let remote = Arc::new(FakeRemote::new());
        let place = PlaceId::new();
        let a = manifest(ModelId::new(), "a");
        let b = manifest(ModelId::new(), "b");
        remote.set_models(place, "/", vec![a.clone(), b.clone()]);

        let (_, cache) = caches(Arc::clone(&remote), &place.to_string(), &config());
        let all = cache.all_under_place(place).await.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(cache.len(), 2);
        // resolved from the listing itself: no per-model remote calls
        assert_eq!(remote.fetch_model_calls(), 0);

        // subsequent point reads are cache hits
        cache.get(&a.key()).await.unwrap();
        assert_eq!(remote.fetch_model_calls(), 0);
    }

    #[tokio::test]
    async fn test_owner_resolution_failure_is_not_a_not_found() {
        let remote = Arc::new(FakeRemote::new());
        let place = PlaceId::new();
        remote.set_failing(true);

        let (_, cache) = caches(Arc::clone(&remote), &place.to_string(), &config());
        let err = cache.get(&ModelKey::new(ModelId::new())).await.unwrap_err();

        assert!(err.is_transient());
        assert!(!err.is_not_found());
    }
}
