//! Content-addressed view over a [`BlobStore`].

use std::fmt;
use std::sync::Arc;

use super::{BlobStore, StorageResult};
use crate::{ContentHash, HashAlgorithm};

/// Result of [`ContentStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The bytes were written as a new entry.
    Stored,
    /// An entry already existed; it was left untouched.
    AlreadyPresent,
}

/// Blob store adapter keyed by [`ContentHash`].
///
/// Keys are `<partition>/<algorithm>/<hex digest>`, e.g.
/// `cross-origin-storage/sha-256/e3b0…`. The adapter guarantees that:
///
/// - [`ContentStore::put`] never overwrites an existing entry, and
/// - [`ContentStore::get`] / [`ContentStore::contains`] report an absent
///   entry as `None` / `false` instead of an error.
#[derive(Clone)]
pub struct ContentStore {
    backend: Arc<dyn BlobStore>,
    partition: Arc<str>,
}

impl fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStore")
            .field("partition", &self.partition)
            .finish_non_exhaustive()
    }
}

impl ContentStore {
    /// Wraps `backend`, placing every entry under `partition`.
    #[must_use]
    pub fn new(backend: Arc<dyn BlobStore>, partition: impl Into<Arc<str>>) -> Self {
        Self {
            backend,
            partition: partition.into(),
        }
    }

    /// The storage partition.
    #[must_use]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Derives the storage key for `hash`.
    #[must_use]
    pub fn key_for(&self, hash: &ContentHash) -> String {
        format!(
            "{}/{}/{}",
            self.partition,
            hash.algorithm().key_segment(),
            hash.value()
        )
    }

    /// Inverse of [`ContentStore::key_for`]. Returns `None` for keys outside
    /// the partition or that do not encode a valid hash.
    #[must_use]
    pub fn hash_for_key(&self, key: &str) -> Option<ContentHash> {
        let rest = key.strip_prefix(&*self.partition)?.strip_prefix('/')?;
        let (segment, value) = rest.split_once('/')?;
        let algorithm = segment.parse::<HashAlgorithm>().ok()?;
        // Reject keys that only parse case-insensitively.
        if algorithm.key_segment() != segment {
            return None;
        }
        ContentHash::new(algorithm, value).ok()
    }

    /// Checks whether an entry exists for `hash`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn contains(&self, hash: &ContentHash) -> StorageResult<bool> {
        self.backend.contains(&self.key_for(hash)).await
    }

    /// Reads the entry for `hash`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn get(&self, hash: &ContentHash) -> StorageResult<Option<Vec<u8>>> {
        self.backend.read(&self.key_for(hash)).await
    }

    /// Stores `bytes` under `hash` unless an entry already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn put(&self, hash: &ContentHash, bytes: &[u8]) -> StorageResult<PutOutcome> {
        let key = self.key_for(hash);
        if self.backend.contains(&key).await? {
            log::debug!("entry for {hash} already present, skipping write");
            return Ok(PutOutcome::AlreadyPresent);
        }
        if self.backend.create(&key, bytes).await? {
            log::info!("stored {} bytes for {hash}", bytes.len());
            Ok(PutOutcome::Stored)
        } else {
            log::debug!("lost create race for {hash}, keeping existing entry");
            Ok(PutOutcome::AlreadyPresent)
        }
    }

    /// Lists the hashes of all stored entries. Keys in the partition that do
    /// not decode to a hash are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn entries(&self) -> StorageResult<Vec<ContentHash>> {
        let prefix = format!("{}/", self.partition);
        let keys = self.backend.keys(&prefix).await?;
        Ok(keys
            .iter()
            .filter_map(|key| {
                let hash = self.hash_for_key(key);
                if hash.is_none() {
                    log::warn!("ignoring foreign key {key:?} in partition");
                }
                hash
            })
            .collect())
    }

    /// Deletes the entry for `hash`. Returns `false` if nothing was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn evict(&self, hash: &ContentHash) -> StorageResult<bool> {
        let removed = self.backend.delete(&self.key_for(hash)).await?;
        if removed {
            log::info!("evicted {hash}");
        }
        Ok(removed)
    }

    /// Deletes every entry in the partition and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn clear(&self) -> StorageResult<usize> {
        let mut removed = 0;
        for hash in self.entries().await? {
            if self.evict(&hash).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;

    fn store() -> (Arc<MemoryBlobStore>, ContentStore) {
        let backend = Arc::new(MemoryBlobStore::new());
        let store = ContentStore::new(backend.clone(), "cross-origin-storage");
        (backend, store)
    }

    #[test]
    fn test_key_derivation() {
        let (_, store) = store();
        let hash = ContentHash::sha256(b"");
        assert_eq!(
            store.key_for(&hash),
            "cross-origin-storage/sha-256/e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(store.hash_for_key(&store.key_for(&hash)), Some(hash));
    }

    #[test]
    fn test_hash_for_key_rejects_foreign_keys() {
        let (_, store) = store();
        assert!(store.hash_for_key("other/sha-256/00").is_none());
        assert!(store.hash_for_key("cross-origin-storage/md5/00").is_none());
        assert!(store.hash_for_key("cross-origin-storage/sha-256/zz").is_none());
        let upper = format!("cross-origin-storage/SHA-256/{}", "a".repeat(64));
        assert!(store.hash_for_key(&upper).is_none());
    }

    #[tokio::test]
    async fn test_put_never_overwrites() {
        let (_, store) = store();
        let hash = ContentHash::sha256(b"original");

        assert_eq!(store.put(&hash, b"original").await.unwrap(), PutOutcome::Stored);
        assert_eq!(
            store.put(&hash, b"imposter").await.unwrap(),
            PutOutcome::AlreadyPresent
        );
        assert_eq!(store.get(&hash).await.unwrap(), Some(b"original".to_vec()));
    }

    #[tokio::test]
    async fn test_absent_is_not_an_error() {
        let (_, store) = store();
        let hash = ContentHash::sha256(b"missing");
        assert!(!store.contains(&hash).await.unwrap());
        assert!(store.get(&hash).await.unwrap().is_none());
        assert!(!store.evict(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_entries_and_clear() {
        let (backend, store) = store();
        let a = ContentHash::sha256(b"a");
        let b = ContentHash::sha256(b"b");
        store.put(&a, b"a").await.unwrap();
        store.put(&b, b"b").await.unwrap();
        backend.create("cross-origin-storage/junk", b"x").await.unwrap();
        backend.create("elsewhere/sha-256/00", b"x").await.unwrap();

        let mut entries = store.entries().await.unwrap();
        entries.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(entries, expected);

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.entries().await.unwrap().is_empty());
        assert_eq!(backend.len(), 2);
    }
}
