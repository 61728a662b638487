//! In-memory blob store.
//!
//! Holds everything in a `HashMap`; nothing survives the process. Used by
//! tests and by hosts that only need a scratch store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{BlobStore, StorageResult};

/// In-memory blob store backed by a `HashMap`.
///
/// Thread-safe; the map lock is never held across an await point.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    /// Storage for blobs, keyed by name.
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Creates a new empty memory blob store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no blobs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes a blob directly, bypassing the broker. Simulates eviction by
    /// the host between handle issuance and use.
    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn create(&self, key: &str, bytes: &[u8]) -> StorageResult<bool> {
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        if blobs.contains_key(key) {
            return Ok(false);
        }
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.remove(key).is_some())
    }

    async fn keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_memory_blob_store_basic() {
        let store = MemoryBlobStore::new();

        assert!(store.is_empty());
        assert!(store.read("test").await.unwrap().is_none());

        assert!(store.create("test", b"hello").await.unwrap());
        assert_eq!(store.len(), 1);
        assert!(store.contains("test").await.unwrap());
        assert_eq!(store.read("test").await.unwrap(), Some(b"hello".to_vec()));

        assert!(store.delete("test").await.unwrap());
        assert!(!store.delete("test").await.unwrap());
        assert!(!store.contains("test").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_blob_store_create_never_overwrites() {
        let store = MemoryBlobStore::new();

        assert!(store.create("test", b"first").await.unwrap());
        assert!(!store.create("test", b"second").await.unwrap());
        assert_eq!(store.read("test").await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_blob_store_keys_by_prefix() {
        let store = MemoryBlobStore::new();

        store.create("a/1", b"data-a").await.unwrap();
        store.create("a/2", b"data-b").await.unwrap();
        store.create("b/1", b"data-c").await.unwrap();

        assert_eq!(store.keys("a/").await.unwrap(), vec!["a/1", "a/2"]);
        assert_eq!(store.keys("").await.unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_memory_blob_store_concurrent_create() {
        let store = Arc::new(MemoryBlobStore::new());
        let mut tasks = Vec::new();

        for i in 0..10u8 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store.create("shared", &[i]).await.unwrap()
            }));
        }

        let mut created = 0;
        for task in tasks {
            if task.await.unwrap() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.len(), 1);
    }
}
