//! Content hashes: the identity key of every stored blob.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use strum::{Display, EnumIter, EnumString};

use crate::ValidationError;

/// Digest algorithm of a [`ContentHash`].
///
/// The string form is the Web Crypto algorithm name (`SHA-256`). Parsing is
/// case-insensitive so the lowercase storage-key segment round-trips.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum HashAlgorithm {
    /// SHA-256, 32-byte digest.
    #[serde(rename = "SHA-256")]
    #[strum(serialize = "SHA-256")]
    Sha256,
    /// SHA-384, 48-byte digest.
    #[serde(rename = "SHA-384")]
    #[strum(serialize = "SHA-384")]
    Sha384,
    /// SHA-512, 64-byte digest.
    #[serde(rename = "SHA-512")]
    #[strum(serialize = "SHA-512")]
    Sha512,
}

impl HashAlgorithm {
    /// Length of the digest in bytes.
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Length of the lowercase hex encoding of the digest.
    #[must_use]
    pub const fn hex_len(self) -> usize {
        self.digest_len() * 2
    }

    /// Path segment used when deriving storage keys (`sha-256`).
    #[must_use]
    pub fn key_segment(self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

/// Identity of a stored blob: an algorithm plus the lowercase hex digest of
/// the full content.
///
/// Two hashes are equal only if both the algorithm and the value match.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawContentHash")]
pub struct ContentHash {
    algorithm: HashAlgorithm,
    value: String,
}

#[derive(Deserialize)]
struct RawContentHash {
    algorithm: String,
    value: String,
}

impl TryFrom<RawContentHash> for ContentHash {
    type Error = ValidationError;

    fn try_from(raw: RawContentHash) -> Result<Self, Self::Error> {
        let algorithm = raw
            .algorithm
            .parse::<HashAlgorithm>()
            .map_err(|_| ValidationError::UnsupportedAlgorithm(raw.algorithm))?;
        Self::new(algorithm, raw.value)
    }
}

impl ContentHash {
    /// Builds a hash from an algorithm and a hex digest.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not lowercase hex of exactly the
    /// algorithm's digest length.
    pub fn new(algorithm: HashAlgorithm, value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.len() != algorithm.hex_len() {
            return Err(ValidationError::InvalidHashLength {
                algorithm,
                expected: algorithm.hex_len(),
                found: value.len(),
            });
        }
        if !value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(ValidationError::InvalidHashEncoding);
        }
        Ok(Self { algorithm, value })
    }

    /// Builds a hash from raw digest bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `digest` has the wrong length for `algorithm`.
    pub fn from_digest(algorithm: HashAlgorithm, digest: &[u8]) -> Result<Self, ValidationError> {
        Self::new(algorithm, hex::encode(digest))
    }

    /// Computes the SHA-256 hash of `bytes`.
    #[must_use]
    pub fn sha256(bytes: &[u8]) -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            value: hex::encode(Sha256::digest(bytes)),
        }
    }

    /// The digest algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The lowercase hex digest.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

/// Computes content hashes.
///
/// The broker only calls this when write verification is enabled; otherwise
/// the hash a caller supplies is trusted as given.
pub trait ContentHasher: Send + Sync {
    /// Hashes the full `bytes` with `algorithm`.
    fn digest(&self, algorithm: HashAlgorithm, bytes: &[u8]) -> ContentHash;
}

/// [`ContentHasher`] backed by the `sha2` implementations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha2Hasher;

impl ContentHasher for Sha2Hasher {
    fn digest(&self, algorithm: HashAlgorithm, bytes: &[u8]) -> ContentHash {
        let value = match algorithm {
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
            HashAlgorithm::Sha384 => hex::encode(Sha384::digest(bytes)),
            HashAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
        };
        ContentHash { algorithm, value }
    }
}
