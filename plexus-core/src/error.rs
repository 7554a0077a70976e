//! Error types for the plexus system.
//!
//! The error enum carries string payloads only, which keeps it `Clone`: a
//! single-flighted fetch stores one result and hands a clone of it to every
//! waiting caller.

/// Result type alias for plexus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the plexus system.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The remote repository could not be reached or answered with a
    /// transport-level failure. Transient; callers with a cached value
    /// serve it instead of surfacing this.
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The remote repository authoritatively reports the entity does not
    /// exist. Surfaced directly, never retried.
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// A bounded remote fetch did not complete in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A remote or event payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new remote-unavailable error
    pub fn remote_unavailable(msg: impl Into<String>) -> Self {
        Self::RemoteUnavailable(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    /// Create a new timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the failure is transient, i.e. a stale cached value may be
    /// served in its place.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_) | Self::Timeout(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
