//! Wire representations of the Digital Enterprise Server's JSON surface.

use chrono::{DateTime, Utc};
use plexus_core::{ModelId, ModelManifest, ModelState, Place, PlaceId, PlaceKind};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlaceDto {
    pub id: PlaceId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PlaceKind,
}

impl From<PlaceDto> for Place {
    fn from(dto: PlaceDto) -> Self {
        Place::new(dto.id, dto.name, dto.kind)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModelManifestDto {
    pub id: ModelId,
    pub name: String,
    pub path: String,
    pub sku: String,
    pub mimetype: String,
    pub version: String,
    pub state: ModelState,
    pub last_modified: DateTime<Utc>,
}

impl From<ModelManifestDto> for ModelManifest {
    fn from(dto: ModelManifestDto) -> Self {
        ModelManifest {
            id: dto.id,
            name: dto.name,
            path: dto.path,
            sku: dto.sku,
            mimetype: dto.mimetype,
            version: dto.version,
            state: dto.state,
            modified_at: dto.last_modified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_dto_mapping() {
        let id = PlaceId::new();
        let json = format!(r#"{{"id":"{id}","name":"Decisions","type":"space"}}"#);

        let place: Place = serde_json::from_str::<PlaceDto>(&json).unwrap().into();
        assert_eq!(place.id, id);
        assert_eq!(place.name, "Decisions");
        assert_eq!(place.kind, PlaceKind::Space);
    }

    #[test]
    fn test_unknown_place_type_tolerated() {
        let json = format!(
            r#"{{"id":"{}","name":"X","type":"sandbox"}}"#,
            PlaceId::new()
        );
        let place: Place = serde_json::from_str::<PlaceDto>(&json).unwrap().into();
        assert_eq!(place.kind, PlaceKind::Unknown);
    }

    #[test]
    fn test_manifest_dto_mapping() {
        let id = ModelId::new();
        let json = format!(
            r#"{{
                "id": "{id}",
                "name": "Loan approval",
                "path": "/decisions/loan.dmn",
                "sku": "SKU-7",
                "mimetype": "application/xml",
                "version": "3",
                "state": "published",
                "lastModified": "2026-01-12T08:30:00Z"
            }}"#
        );

        let manifest: ModelManifest =
            serde_json::from_str::<ModelManifestDto>(&json).unwrap().into();
        assert_eq!(manifest.id, id);
        assert_eq!(manifest.version, "3");
        assert_eq!(manifest.state, ModelState::Published);
        assert_eq!(manifest.modified_at.to_rfc3339(), "2026-01-12T08:30:00+00:00");
    }

    #[test]
    fn test_manifest_missing_field_is_a_decode_error() {
        let json = format!(r#"{{"id":"{}","name":"x"}}"#, ModelId::new());
        assert!(serde_json::from_str::<ModelManifestDto>(&json).is_err());
    }
}
