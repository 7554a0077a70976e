//! The catalog mirror facade.
//!
//! Wires the scope resolver, the two caches, and the event dispatcher into
//! one component, and owns the scheduled full refresh. Downstream
//! collaborators (the metadata-introspection and catalog-serving layers)
//! read through this facade; the push channel feeds [`CatalogMirror::handle_event`].

use crate::dispatcher::{EventDispatcher, PushEvent};
use crate::manifest_cache::ModelManifestCache;
use crate::place_cache::PlaceCache;
use crate::scope::ScopeSet;
use plexus_core::{MirrorConfig, ModelKey, ModelManifest, Place, PlaceId, RemoteRepository, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Local mirror of the remote model repository.
pub struct CatalogMirror {
    place_cache: Arc<PlaceCache>,
    manifest_cache: Arc<ModelManifestCache>,
    dispatcher: EventDispatcher,
    config: MirrorConfig,
}

impl CatalogMirror {
    /// Build a mirror over a remote repository.
    ///
    /// Scopes are resolved once from `config.scopes`; listing replacements
    /// cascade eviction of vanished models into the manifest cache.
    pub fn new(remote: Arc<dyn RemoteRepository>, config: MirrorConfig) -> Self {
        let scopes = ScopeSet::parse(&config.scopes);
        if scopes.is_empty() {
            warn!("no valid scopes configured, the mirrored catalog will be empty");
        } else {
            info!(places = scopes.len(), "mirror watching configured scopes");
        }

        let place_cache = Arc::new(PlaceCache::new(Arc::clone(&remote), scopes, &config));
        let manifest_cache = Arc::new(ModelManifestCache::new(
            remote,
            Arc::clone(&place_cache),
            &config,
        ));

        // Upstream deletions are evicted eagerly: whenever a listing
        // replacement drops a model id, the manifest cache follows. The
        // hook holds a weak handle so the caches stay cycle-free.
        let weak_manifests = Arc::downgrade(&manifest_cache);
        place_cache.set_eviction_hook(Arc::new(move |place, vanished| {
            if let Some(manifests) = weak_manifests.upgrade() {
                debug!(%place, count = vanished.len(), "cascading eviction of vanished models");
                for model in vanished {
                    manifests.remove_model(model);
                }
            }
        }));

        let dispatcher =
            EventDispatcher::new(Arc::clone(&place_cache), Arc::clone(&manifest_cache));

        Self {
            place_cache,
            manifest_cache,
            dispatcher,
            config,
        }
    }

    /// All places visible to the configured scopes.
    pub async fn places(&self) -> Result<Arc<Vec<Place>>> {
        self.place_cache.places().await
    }

    /// The scoped model listing of one configured place.
    pub async fn listing(&self, place: PlaceId) -> Result<Arc<Vec<ModelManifest>>> {
        self.place_cache.listing(place).await
    }

    /// One model manifest by key.
    pub async fn model(&self, key: &ModelKey) -> Result<Arc<ModelManifest>> {
        self.manifest_cache.get(key).await
    }

    /// Every manifest under one configured place.
    pub async fn models_under_place(&self, place: PlaceId) -> Result<Vec<Arc<ModelManifest>>> {
        self.manifest_cache.all_under_place(place).await
    }

    /// Feed one push event into the dispatcher.
    pub fn handle_event(&self, event: PushEvent) {
        self.dispatcher.dispatch(event);
    }

    /// The place cache.
    pub fn place_cache(&self) -> &Arc<PlaceCache> {
        &self.place_cache
    }

    /// The manifest cache.
    pub fn manifest_cache(&self) -> &Arc<ModelManifestCache> {
        &self.manifest_cache
    }

    /// Refresh the place set and every configured listing.
    ///
    /// Listings refresh in parallel; every failure is logged and the last
    /// one is returned after all places have been attempted, so one
    /// unreachable place does not starve the rest.
    pub async fn refresh_all(&self) -> Result<()> {
        self.place_cache.invalidate_places();
        self.place_cache.places().await?;

        let place_cache = &self.place_cache;
        let refreshes = place_cache.scopes().places().map(|place| async move {
            (place, place_cache.refresh(place).await)
        });

        let mut failed = None;
        for (place, result) in futures::future::join_all(refreshes).await {
            if let Err(err) = result {
                warn!(%place, %err, "listing refresh failed");
                failed = Some(err);
            }
        }

        match failed {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Spawn the periodic full-refresh task.
    ///
    /// The first tick fires immediately, covering the startup population;
    /// later ticks follow `config.refresh_interval`. Tick failures are
    /// logged and the task keeps running; push events and lazy reads pick
    /// up the slack until the next tick. Abort the returned handle to stop
    /// the schedule.
    pub fn spawn_refresh_task(self: &Arc<Self>) -> JoinHandle<()> {
        let mirror = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(mirror.config.refresh_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match mirror.refresh_all().await {
                    Ok(()) => debug!("scheduled refresh completed"),
                    Err(err) => warn!(%err, "scheduled refresh failed"),
                }
            }
        })
    }
}
