//! Platform interface for the persistent blob store.

use async_trait::async_trait;

use super::error::StorageResult;

/// Persistent byte store addressed by opaque string keys.
///
/// The broker never talks to a `BlobStore` directly; it goes through
/// [`ContentStore`](super::ContentStore), which derives keys from content
/// hashes.
///
/// # Implementation Notes
///
/// ## Create-if-absent
///
/// [`BlobStore::create`] MUST NOT replace an existing entry. Two concurrent
/// creates for the same key leave exactly one of the payloads in place and
/// report `true` to at most one caller.
///
/// ## Absent keys
///
/// Reads and deletes of an absent key are not errors. Only genuine backend
/// failures (I/O, quota, poisoned state) are reported as `Err`.
///
/// ## Platform Specifics
///
/// - **Native**: [`FileBlobStore`](super::FileBlobStore), one file per key
/// - **Browser**: Cache Storage partition, keyed by request path
/// - **Tests**: [`MemoryBlobStore`](super::MemoryBlobStore)
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Reads the blob at `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `bytes` under `key` unless an entry already exists.
    ///
    /// Returns `true` if this call created the entry, `false` if one was
    /// already present (its content is left untouched).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn create(&self, key: &str, bytes: &[u8]) -> StorageResult<bool>;

    /// Deletes the blob at `key`. Returns `false` if nothing was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Lists the keys that start with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the enumeration fails.
    async fn keys(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Checks if a blob exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read operation fails.
    async fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.read(key).await?.is_some())
    }
}
