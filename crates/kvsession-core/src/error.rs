//! Error types for session store operations.

use crate::backend::BackendError;

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store configuration is unusable (e.g. a malformed key schema).
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Error reported by the backend, passed through unchanged.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A stored payload could not be read back as a session object.
    #[error("Malformed session '{key}': {reason}")]
    MalformedSession { key: String, reason: String },
}

impl Error {
    /// Check if this error came from the backend collaborator.
    pub fn is_backend(&self) -> bool {
        matches!(self, Error::Backend(_))
    }
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
