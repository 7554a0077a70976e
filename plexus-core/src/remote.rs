//! The remote-repository seam.
//!
//! The cache core depends on the Digital Enterprise Server only through
//! this trait: list places, list models under a place/path, fetch one
//! model. Everything else about the remote system (wire format, transport,
//! authentication) stays behind the implementation.

use crate::error::Result;
use crate::id::{ModelId, PlaceId};
use crate::types::{ModelManifest, Place};
use async_trait::async_trait;

/// Narrow client contract against the remote model repository.
///
/// Implementations must be safe to call concurrently; the cache layer
/// fans out across places and single-flights per key, so a given method
/// may run in parallel with itself for different arguments.
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// List every place visible to the integration account.
    async fn list_places(&self) -> Result<Vec<Place>>;

    /// List model manifests under a path prefix of one place.
    ///
    /// `path` follows scope normalization: `/` addresses the place root.
    async fn list_models(&self, place: PlaceId, path: &str) -> Result<Vec<ModelManifest>>;

    /// Fetch a single model manifest, optionally pinned to a version.
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) when the remote
    /// system authoritatively reports the model absent.
    async fn fetch_model(
        &self,
        place: PlaceId,
        model: ModelId,
        version: Option<&str>,
    ) -> Result<ModelManifest>;
}
