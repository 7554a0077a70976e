//! Domain types for the catalog mirror.

use crate::id::{ModelId, PlaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A remote repository/workspace containing models.
///
/// Places are immutable once fetched; the mirror refreshes them wholesale
/// on its schedule rather than mutating them in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Place {
    /// Stable identifier assigned by the remote system
    pub id: PlaceId,

    /// Human-readable name
    pub name: String,

    /// Kind of place as reported by the remote system
    pub kind: PlaceKind,
}

impl Place {
    /// Create a new place record.
    pub fn new(id: PlaceId, name: impl Into<String>, kind: PlaceKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }
}

/// Kind of a remote place.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaceKind {
    /// A collaborative workspace
    Space,
    /// A project-scoped repository
    Project,
    /// A shared asset library
    Library,
    /// Any kind this build does not know about
    #[serde(other)]
    Unknown,
}

impl fmt::Display for PlaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Space => "space",
            Self::Project => "project",
            Self::Library => "library",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Publication state of a model artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    /// Published and visible to consumers
    Published,
    /// Work in progress
    Draft,
    /// Retired from the catalog
    Archived,
    /// Any state this build does not know about
    #[serde(other)]
    Unknown,
}

/// Metadata record for one versioned model artifact within a place.
///
/// Manifests are produced by fetching from the remote system and are never
/// authored locally. Replacement in the caches is atomic: a refresh swaps
/// the whole manifest, so readers see either the old or the new record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelManifest {
    /// Model identifier, stable across versions
    pub id: ModelId,

    /// Human-readable name
    pub name: String,

    /// Path of the model within its place
    pub path: String,

    /// Stock-keeping identifier assigned by the remote system
    pub sku: String,

    /// Mimetype of the artifact
    pub mimetype: String,

    /// Version label of this manifest
    pub version: String,

    /// Publication state
    pub state: ModelState,

    /// Last-modified marker reported by the remote system
    pub modified_at: DateTime<Utc>,
}

impl ModelManifest {
    /// The cache key for the head (unversioned) lookup of this manifest.
    pub fn key(&self) -> ModelKey {
        ModelKey::new(self.id)
    }

    /// The cache key qualified with this manifest's version.
    pub fn versioned_key(&self) -> ModelKey {
        ModelKey::versioned(self.id, self.version.clone())
    }
}

/// Composite cache identity for a model manifest: the model id, optionally
/// qualified by version for historical lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    /// Model identifier
    pub id: ModelId,

    /// Version qualifier; `None` addresses the head manifest
    pub version: Option<String>,
}

impl ModelKey {
    /// Key for the head manifest of a model.
    pub fn new(id: ModelId) -> Self {
        Self { id, version: None }
    }

    /// Key for a specific historical version of a model.
    pub fn versioned(id: ModelId, version: impl Into<String>) -> Self {
        Self {
            id,
            version: Some(version.into()),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.id, v),
            None => write!(f, "{}", self.id),
        }
    }
}
