//! Filesystem blob store: one file per key under a root directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::{BlobStore, StorageError, StorageResult};

/// Directory under the root that holds in-flight writes.
const STAGING_DIRNAME: &str = ".staging";

/// Blob store that maps each `/`-separated key onto a file path below
/// `root`.
///
/// Writes go to a staging file first, are synced, and are then hard-linked
/// into place. The link fails if the target exists, so an entry is never
/// replaced and readers never observe a partially written file.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let invalid = |reason| StorageError::InvalidKey {
            key: key.to_string(),
            reason,
        };
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if segment.starts_with('.') {
                return Err(invalid("dot segments are reserved"));
            }
            if segment.contains(['\\', '\0']) {
                return Err(invalid("forbidden character"));
            }
            path.push(segment);
        }
        Ok(path)
    }

    async fn stage(&self, bytes: &[u8]) -> StorageResult<PathBuf> {
        let staging = self.root.join(STAGING_DIRNAME);
        fs::create_dir_all(&staging)
            .await
            .map_err(|err| StorageError::io("create staging directory", err))?;
        let tmp = staging.join(format!("{}.tmp", Uuid::new_v4()));
        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|err| StorageError::io("create staging file", err))?;
        file.write_all(bytes)
            .await
            .map_err(|err| StorageError::io("write staging file", err))?;
        file.sync_all()
            .await
            .map_err(|err| StorageError::io("sync staging file", err))?;
        Ok(tmp)
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::io(format!("read {}", path.display()), err)),
        }
    }

    async fn create(&self, key: &str, bytes: &[u8]) -> StorageResult<bool> {
        let path = self.path_for(key)?;
        if fs::try_exists(&path)
            .await
            .map_err(|err| StorageError::io(format!("stat {}", path.display()), err))?
        {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| StorageError::io("create entry directory", err))?;
        }

        let tmp = self.stage(bytes).await?;
        let linked = match fs::hard_link(&tmp, &path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(StorageError::io(format!("link {}", path.display()), err)),
        };
        if let Err(err) = fs::remove_file(&tmp).await {
            log::warn!("failed to remove staging file {}: {err}", tmp.display());
        }
        linked
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::io(format!("delete {}", path.display()), err)),
        }
    }

    async fn keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, key_prefix)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(StorageError::io(format!("list {}", dir.display()), err));
                }
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|err| StorageError::io(format!("list {}", dir.display()), err))?
            {
                let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                    continue;
                };
                if name.starts_with('.') {
                    continue;
                }
                let key = format!("{key_prefix}{name}");
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|err| StorageError::io("stat directory entry", err))?;
                if file_type.is_dir() {
                    pending.push((entry.path(), format!("{key}/")));
                } else if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
