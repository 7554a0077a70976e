//! Push-event dispatch: asynchronous change notifications from the remote
//! system converted into targeted cache invalidations.
//!
//! A broker may deliver many events with no isolation between them, so
//! dispatch never fails outward: unrecognized types and undecodable
//! payloads are dropped with a diagnostic, and one bad event cannot
//! disturb the processing of the next. Invalidation is idempotent and no
//! cross-event ordering is assumed.

use crate::manifest_cache::ModelManifestCache;
use crate::place_cache::PlaceCache;
use plexus_core::{ModelId, ModelKey, PlaceId, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Event type string for graph re-index notifications.
pub const EVENT_GRAPH_MODEL_INDEXED: &str = "GraphModelIndexed";
/// Event type string for repository model writes.
pub const EVENT_REPOSITORY_MODEL_WRITE: &str = "RepositoryModelWrite";
/// Event type string for repository model deletions.
pub const EVENT_REPOSITORY_MODEL_DELETE: &str = "RepositoryModelDelete";

/// An inbound push notification, as handed over by the event source.
#[derive(Debug, Clone)]
pub struct PushEvent {
    /// Declared event type
    pub event_type: String,
    /// Payload in whichever encoding the broker delivered
    pub data: EventData,
}

impl PushEvent {
    pub fn new(event_type: impl Into<String>, data: EventData) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }
}

/// The payload encodings a broker may deliver.
///
/// The variant is resolved once by [`EventData::decode`]; call sites never
/// re-inspect the representation.
#[derive(Debug, Clone)]
pub enum EventData {
    /// A structured JSON node
    Node(serde_json::Value),
    /// Raw bytes carrying JSON
    Bytes(Vec<u8>),
    /// An already-deserialized payload
    Typed(ModelChange),
}

impl EventData {
    /// Normalize any encoding into a typed [`ModelChange`].
    pub fn decode(self) -> Result<ModelChange> {
        match self {
            Self::Typed(change) => Ok(change),
            Self::Node(value) => Ok(serde_json::from_value(value)?),
            Self::Bytes(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }
}

/// Normalized payload of a model/place change notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelChange {
    /// Place the change occurred in, when the event names one
    pub place_id: Option<PlaceId>,
    /// Model the change concerns, when the event names one
    pub model_id: Option<ModelId>,
    /// Version the change concerns, when the event names one
    pub version: Option<String>,
}

/// Converts push events into cache invalidations and refreshes.
pub struct EventDispatcher {
    place_cache: Arc<PlaceCache>,
    manifest_cache: Arc<ModelManifestCache>,
}

impl EventDispatcher {
    pub fn new(place_cache: Arc<PlaceCache>, manifest_cache: Arc<ModelManifestCache>) -> Self {
        Self {
            place_cache,
            manifest_cache,
        }
    }

    /// Handle one push event.
    ///
    /// Performs the cache mutation and returns; a graph re-index spawns
    /// its refetch in the background rather than awaiting it. Must be
    /// called within a tokio runtime.
    pub fn dispatch(&self, event: PushEvent) {
        match event.event_type.as_str() {
            EVENT_REPOSITORY_MODEL_WRITE | EVENT_REPOSITORY_MODEL_DELETE => {
                let Some(change) = self.decode(event.event_type.as_str(), event.data) else {
                    return;
                };
                let Some(model) = change.model_id else {
                    warn!(event_type = %event.event_type, "dropping model event without a model id");
                    return;
                };
                self.invalidate_model(model, change.version.as_deref());
            }
            EVENT_GRAPH_MODEL_INDEXED => {
                let Some(change) = self.decode(event.event_type.as_str(), event.data) else {
                    return;
                };
                let Some(place) = change.place_id else {
                    warn!(event_type = %event.event_type, "dropping re-index event without a place id");
                    return;
                };

                // A re-index can co-occur with a content change.
                if let Some(model) = change.model_id {
                    self.invalidate_model(model, change.version.as_deref());
                }

                debug!(%place, "re-index event, refreshing place listing");
                let place_cache = Arc::clone(&self.place_cache);
                tokio::spawn(async move {
                    if let Err(err) = place_cache.refresh(place).await {
                        warn!(%place, %err, "event-driven place refresh failed");
                    }
                });
            }
            other => {
                warn!(event_type = other, "dropping unsupported event type");
            }
        }
    }

    fn decode(&self, event_type: &str, data: EventData) -> Option<ModelChange> {
        match data.decode() {
            Ok(change) => Some(change),
            Err(err) => {
                warn!(event_type, %err, "dropping event with undecodable payload");
                None
            }
        }
    }

    /// Invalidate the head entry and, when named, the versioned entry.
    fn invalidate_model(&self, model: ModelId, version: Option<&str>) {
        self.manifest_cache.invalidate(&ModelKey::new(model));
        if let Some(version) = version {
            self.manifest_cache
                .invalidate(&ModelKey::versioned(model, version));
        }
    }
}
