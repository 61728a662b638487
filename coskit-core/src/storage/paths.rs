//! Storage path helpers.

use std::path::{Path, PathBuf};

const COSKIT_DIRNAME: &str = "coskit";
const BLOBS_DIRNAME: &str = "blobs";
const LEDGER_FILENAME: &str = "consent-ledger.json";

/// Paths for broker state under `<root>/coskit`.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
    coskit_dir: PathBuf,
}

impl StoragePaths {
    /// Builds storage paths rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let coskit_dir = root.join(COSKIT_DIRNAME);
        Self { root, coskit_dir }
    }

    /// Returns the storage root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the broker's own directory.
    #[must_use]
    pub fn coskit_dir(&self) -> &Path {
        &self.coskit_dir
    }

    /// Returns the root of the file-backed blob store.
    #[must_use]
    pub fn blobs_dir(&self) -> PathBuf {
        self.coskit_dir.join(BLOBS_DIRNAME)
    }

    /// Returns the path of the persisted consent ledger snapshot.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.coskit_dir.join(LEDGER_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_layout() {
        let paths = StoragePaths::new("/data");
        assert_eq!(paths.root(), Path::new("/data"));
        assert_eq!(paths.coskit_dir(), Path::new("/data/coskit"));
        assert_eq!(paths.blobs_dir(), PathBuf::from("/data/coskit/blobs"));
        assert_eq!(
            paths.ledger_path(),
            PathBuf::from("/data/coskit/consent-ledger.json")
        );
    }
}
