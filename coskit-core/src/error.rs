use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::storage::StorageError;
use crate::{ContentHash, HashAlgorithm, Origin};

/// Result type for broker operations.
pub type BrokerResult<T, E = BrokerError> = std::result::Result<T, E>;

/// Malformed input rejected before any consent step or storage access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The hash names an algorithm the broker does not know.
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// The hex digest has the wrong length for its algorithm.
    #[error("{algorithm} digest must be {expected} hex characters, got {found}")]
    InvalidHashLength {
        /// Algorithm the digest was checked against.
        algorithm: HashAlgorithm,
        /// Expected number of hex characters.
        expected: usize,
        /// Number of characters supplied.
        found: usize,
    },
    /// The digest is not lowercase hex.
    #[error("hash value must be lowercase hex")]
    InvalidHashEncoding,
    /// The description is empty or blank.
    #[error("description must not be empty")]
    EmptyDescription,
    /// The description contains a line break or control character.
    #[error("description must not contain line breaks or control characters")]
    DescriptionControlCharacter,
    /// The origin is not a serialized `scheme://host[:port]` origin.
    #[error("invalid origin {origin:?}: {reason}")]
    InvalidOrigin {
        /// The rejected input.
        origin: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// Written bytes do not hash to the handle's content hash.
    #[error("content does not match {expected}, computed {computed}")]
    HashMismatch {
        /// Hash the handle is bound to.
        expected: ContentHash,
        /// Hash of the bytes that were offered.
        computed: ContentHash,
    },
}

/// Errors returned by [`StorageBroker`](crate::StorageBroker) and
/// [`FileHandle`](crate::FileHandle) operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// No entry is stored for the hash.
    #[error("no entry stored for {0}")]
    NotFound(ContentHash),
    /// Consent was denied or the prompt was abandoned.
    #[error("{origin} is not allowed to use {hash}")]
    NotAllowed {
        /// Requesting origin.
        origin: Origin,
        /// Requested hash.
        hash: ContentHash,
    },
    /// The operation does not fit the state of the handle or connection.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    /// Malformed input.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The blob store failed. Distinct from [`BrokerError::NotFound`].
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl BrokerError {
    /// Wire-level name of the error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFoundError,
            Self::NotAllowed { .. } => ErrorCode::NotAllowedError,
            Self::InvalidState(_) => ErrorCode::InvalidStateError,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Storage(_) => ErrorCode::UnknownError,
        }
    }
}

/// Error names carried in protocol responses, following `DOMException`
/// naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum ErrorCode {
    /// See [`BrokerError::NotFound`].
    NotFoundError,
    /// See [`BrokerError::NotAllowed`].
    NotAllowedError,
    /// See [`BrokerError::InvalidState`].
    InvalidStateError,
    /// See [`BrokerError::Validation`].
    ValidationError,
    /// See [`BrokerError::Storage`].
    UnknownError,
}
