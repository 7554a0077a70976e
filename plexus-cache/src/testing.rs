//! In-memory remote repository for tests.
//!
//! Backs the cache suites with a scriptable `RemoteRepository`: seedable
//! places and per-path model listings, injectable failures, an optional
//! per-call delay, and call counters for asserting single-flight behavior.

use async_trait::async_trait;
use parking_lot::Mutex;
use plexus_core::{Error, ModelId, ModelManifest, Place, PlaceId, RemoteRepository, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::sleep;

/// Scriptable in-memory implementation of [`RemoteRepository`].
#[derive(Default)]
pub struct FakeRemote {
    places: Mutex<Vec<Place>>,
    models: Mutex<HashMap<(PlaceId, String), Vec<ModelManifest>>>,
    list_places_calls: AtomicU32,
    list_models_calls: AtomicU32,
    fetch_model_calls: AtomicU32,
    fail: AtomicBool,
    delay: Mutex<Duration>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `delay`; lets tests overlap concurrent reads.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = delay;
        self
    }

    pub fn add_place(&self, place: Place) {
        self.places.lock().push(place);
    }

    /// Seed the listing returned for one (place, path) pair.
    pub fn set_models(&self, place: PlaceId, path: &str, models: Vec<ModelManifest>) {
        self.models.lock().insert((place, path.to_string()), models);
    }

    /// Make every subsequent call fail with `RemoteUnavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn list_places_calls(&self) -> u32 {
        self.list_places_calls.load(Ordering::SeqCst)
    }

    pub fn list_models_calls(&self) -> u32 {
        self.list_models_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_model_calls(&self) -> u32 {
        self.fetch_model_calls.load(Ordering::SeqCst)
    }

    async fn gate(&self) -> Result<()> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::remote_unavailable("injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteRepository for FakeRemote {
    async fn list_places(&self) -> Result<Vec<Place>> {
        self.list_places_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self.places.lock().clone())
    }

    async fn list_models(&self, place: PlaceId, path: &str) -> Result<Vec<ModelManifest>> {
        self.list_models_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self
            .models
            .lock()
            .get(&(place, path.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_model(
        &self,
        place: PlaceId,
        model: ModelId,
        version: Option<&str>,
    ) -> Result<ModelManifest> {
        self.fetch_model_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        self.models
            .lock()
            .iter()
            .filter(|((p, _), _)| *p == place)
            .flat_map(|(_, manifests)| manifests.iter())
            .find(|m| m.id == model && version.is_none_or(|v| m.version == v))
            .cloned()
            .ok_or_else(|| Error::not_found("model", model))
    }
}

/// Build a manifest with sensible defaults for tests.
pub fn manifest(id: ModelId, name: &str) -> ModelManifest {
    use chrono::Utc;
    use plexus_core::ModelState;

    ModelManifest {
        id,
        name: name.to_string(),
        path: format!("/{name}.dmn"),
        sku: format!("SKU-{name}"),
        mimetype: "application/xml".to_string(),
        version: "1".to_string(),
        state: ModelState::Published,
        modified_at: Utc::now(),
    }
}
