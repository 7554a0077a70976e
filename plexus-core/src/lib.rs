//! Core types and abstractions for the plexus catalog mirror.
//!
//! This crate provides the domain types, identifiers, error handling,
//! configuration, and the remote-repository seam used across all plexus
//! components.

pub mod config;
pub mod error;
pub mod id;
pub mod remote;
pub mod types;

pub use config::MirrorConfig;
pub use error::{Error, Result};
pub use id::{ModelId, PlaceId};
pub use remote::RemoteRepository;
pub use types::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::MirrorConfig;
    pub use crate::error::{Error, Result};
    pub use crate::id::{ModelId, PlaceId};
    pub use crate::remote::RemoteRepository;
    pub use crate::types::*;
}
