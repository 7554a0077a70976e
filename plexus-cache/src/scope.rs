//! Scope configuration parsing.
//!
//! A scope string enumerates the place/path subtrees the mirror watches:
//! comma-separated tokens of the form `placeId/path`. Parsing fails soft:
//! malformed tokens are dropped with a diagnostic instead of aborting the
//! whole parse, so one bad entry cannot take the mirror down.

use plexus_core::PlaceId;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// The place root path every bare-place scope normalizes to.
pub const ROOT_PATH: &str = "/";

/// Resolved scope configuration: path prefixes to watch, grouped by place.
///
/// Multiple tokens for the same place accumulate into one path set;
/// duplicate paths collapse. Input order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet {
    scopes: HashMap<PlaceId, BTreeSet<String>>,
}

impl ScopeSet {
    /// Parse a scope configuration string.
    ///
    /// Token forms:
    /// - `placeId/path` → watch `path` under the place
    /// - `placeId` or `placeId/` → watch the place root (`/`)
    /// - anything whose prefix is not a UUID-shaped place id → dropped
    ///   with a logged diagnostic, never silently included
    pub fn parse(raw: &str) -> Self {
        let mut scopes: HashMap<PlaceId, BTreeSet<String>> = HashMap::new();

        for token in raw.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            let (prefix, rest) = match token.split_once('/') {
                Some((prefix, rest)) => (prefix, rest),
                None => (token, ""),
            };

            let place = match PlaceId::parse(prefix) {
                Ok(place) => place,
                Err(_) => {
                    warn!(token, "dropping scope token without a place id prefix");
                    continue;
                }
            };

            let path = if rest.is_empty() {
                ROOT_PATH.to_string()
            } else {
                rest.to_string()
            };

            scopes.entry(place).or_default().insert(path);
        }

        Self { scopes }
    }

    /// All configured places.
    pub fn places(&self) -> impl Iterator<Item = PlaceId> + '_ {
        self.scopes.keys().copied()
    }

    /// The watched path prefixes for one place.
    pub fn paths(&self, place: PlaceId) -> Option<&BTreeSet<String>> {
        self.scopes.get(&place)
    }

    /// Whether the place appears in any configured scope.
    pub fn contains(&self, place: PlaceId) -> bool {
        self.scopes.contains_key(&place)
    }

    /// Number of configured places.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Whether no scope parsed successfully.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
