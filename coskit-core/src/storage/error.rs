//! Error types for blob store backends.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by blob store backends and the content store adapter.
///
/// An absent entry is never an error; backends report it as `None` or
/// `false` so callers can tell "not found" apart from a failing store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Errors coming from the blob store backend.
    #[error("blob store error: {0}")]
    BlobStore(String),

    /// Filesystem failures.
    #[error("{context}: {source}")]
    Io {
        /// Operation that failed.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A key that cannot be mapped onto the backend.
    #[error("invalid storage key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Serialization/deserialization failures.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Wraps an I/O error with the operation that failed. For backends that
    /// sit on a filesystem.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
