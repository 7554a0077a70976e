//! The Digital Enterprise Server HTTP client.

use crate::dto::{ModelManifestDto, PlaceDto};
use async_trait::async_trait;
use plexus_core::{
    Error, MirrorConfig, ModelId, ModelManifest, Place, PlaceId, RemoteRepository, Result,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

/// `RemoteRepository` implementation over the server's JSON API.
///
/// The client applies the configured fetch timeout at the transport level;
/// the cache layer additionally bounds whole operations, so a slow remote
/// can never wedge a reader.
pub struct DesClient {
    http: reqwest::Client,
    base_url: String,
}

impl DesClient {
    /// Build a client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>, config: &MirrorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn places_url(&self) -> String {
        format!("{}/api/places", self.base_url)
    }

    fn models_url(&self, place: PlaceId) -> String {
        format!("{}/api/places/{}/models", self.base_url, place)
    }

    fn model_url(&self, place: PlaceId, model: ModelId) -> String {
        format!("{}/api/places/{}/models/{}", self.base_url, place, model)
    }

    /// Send a GET and decode the JSON body, mapping HTTP failure modes
    /// into the core taxonomy.
    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        resource: &str,
        id: &str,
    ) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(format!("{resource} {id}"))
            } else {
                Error::remote_unavailable(e.to_string())
            }
        })?;

        match response.status() {
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| Error::decode(format!("{resource} {id}: {e}"))),
            StatusCode::NOT_FOUND => Err(Error::not_found(resource, id)),
            status => Err(Error::remote_unavailable(format!(
                "{resource} {id}: http {status}"
            ))),
        }
    }
}

#[async_trait]
impl RemoteRepository for DesClient {
    async fn list_places(&self) -> Result<Vec<Place>> {
        debug!("listing places");
        let places: Vec<PlaceDto> = self
            .get_json(self.http.get(self.places_url()), "places", "*")
            .await?;
        Ok(places.into_iter().map(Place::from).collect())
    }

    async fn list_models(&self, place: PlaceId, path: &str) -> Result<Vec<ModelManifest>> {
        debug!(%place, path, "listing models");
        let request = self
            .http
            .get(self.models_url(place))
            .query(&[("path", path)]);
        let models: Vec<ModelManifestDto> = self
            .get_json(request, "place", &place.to_string())
            .await?;
        Ok(models.into_iter().map(ModelManifest::from).collect())
    }

    async fn fetch_model(
        &self,
        place: PlaceId,
        model: ModelId,
        version: Option<&str>,
    ) -> Result<ModelManifest> {
        debug!(%place, %model, version, "fetching model");
        let mut request = self.http.get(self.model_url(place, model));
        if let Some(version) = version {
            request = request.query(&[("version", version)]);
        }
        let manifest: ModelManifestDto = self
            .get_json(request, "model", &model.to_string())
            .await?;
        Ok(manifest.into())
    }
}
