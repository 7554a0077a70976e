//! Configuration for the catalog mirror.
//!
//! Configuration is an explicit value handed to each component at
//! construction. There is no process-wide configuration singleton: two
//! mirrors with different scopes and TTLs can coexist in one process, and
//! tests construct throwaway configs freely.
//!
//! # Environment overrides
//!
//! | Variable | Field |
//! |---|---|
//! | `PLEXUS_SCOPES` | `scopes` |
//! | `PLEXUS_PLACE_TTL_SECS` | `place_ttl` |
//! | `PLEXUS_MANIFEST_TTL_SECS` | `manifest_ttl` |
//! | `PLEXUS_REFRESH_INTERVAL_SECS` | `refresh_interval` |
//! | `PLEXUS_FETCH_TIMEOUT_SECS` | `fetch_timeout` |

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Environment variable prefix for all plexus configuration overrides
pub const ENV_PREFIX: &str = "PLEXUS_";

// Environment variable names
pub const ENV_SCOPES: &str = "PLEXUS_SCOPES";
pub const ENV_PLACE_TTL_SECS: &str = "PLEXUS_PLACE_TTL_SECS";
pub const ENV_MANIFEST_TTL_SECS: &str = "PLEXUS_MANIFEST_TTL_SECS";
pub const ENV_REFRESH_INTERVAL_SECS: &str = "PLEXUS_REFRESH_INTERVAL_SECS";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "PLEXUS_FETCH_TIMEOUT_SECS";

/// Configuration for the catalog mirror.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MirrorConfig {
    /// Configured scopes: comma-separated `placeId/path` tokens. A token
    /// that is a bare place id (or has a trailing slash with no path)
    /// watches the place root.
    pub scopes: String,

    /// Freshness window for the place set and per-place listings.
    pub place_ttl: Duration,

    /// Freshness window for individual model manifests.
    pub manifest_ttl: Duration,

    /// Interval between scheduled full refreshes.
    pub refresh_interval: Duration,

    /// Upper bound on any single remote fetch.
    pub fetch_timeout: Duration,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            scopes: String::new(),
            place_ttl: Duration::from_secs(300),
            manifest_ttl: Duration::from_secs(300),
            refresh_interval: Duration::from_secs(600),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl MirrorConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configured scopes string.
    pub fn with_scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = scopes.into();
        self
    }

    /// Set the place/listing TTL.
    pub fn with_place_ttl(mut self, ttl: Duration) -> Self {
        self.place_ttl = ttl;
        self
    }

    /// Set the manifest TTL.
    pub fn with_manifest_ttl(mut self, ttl: Duration) -> Self {
        self.manifest_ttl = ttl;
        self
    }

    /// Set the scheduled refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the remote fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Apply environment-variable overrides on top of the current values.
    ///
    /// Unparseable values are skipped with a diagnostic rather than
    /// aborting startup.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(scopes) = std::env::var(ENV_SCOPES) {
            self.scopes = scopes;
        }
        for (var, field) in [
            (ENV_PLACE_TTL_SECS, &mut self.place_ttl),
            (ENV_MANIFEST_TTL_SECS, &mut self.manifest_ttl),
            (ENV_REFRESH_INTERVAL_SECS, &mut self.refresh_interval),
            (ENV_FETCH_TIMEOUT_SECS, &mut self.fetch_timeout),
        ] {
            if let Ok(raw) = std::env::var(var) {
                match raw.parse::<u64>() {
                    Ok(secs) => *field = Duration::from_secs(secs),
                    Err(_) => warn!(%var, value = %raw, "ignoring unparseable duration override"),
                }
            }
        }
        self
    }
}
