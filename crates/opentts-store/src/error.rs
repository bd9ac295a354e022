//! Error types for the state store.

use opentts_types::ValidationError;

/// Errors that can occur while writing state documents.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("state io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The atomic rename of the temporary file failed.
    #[error("failed to replace {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A client-supplied document failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
