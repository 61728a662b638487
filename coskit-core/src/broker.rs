//! The storage broker: consent first, then the content store.

use std::fmt;
use std::sync::Arc;

use crate::consent::{Access, ConsentLedger, ConsentPrompter, PermissionRequest, PermissionStateMachine};
use crate::storage::{BlobStore, ContentStore, PutOutcome};
use crate::{
    BrokerConfig, BrokerError, BrokerResult, ConfigError, ContentHash, ContentHasher, Description,
    Origin, Sha2Hasher, ValidationError,
};

/// Options for [`StorageBroker::request_handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// The requesting origin's label for the file. Validated before any
    /// consent step.
    pub description: String,
    /// Ask for a handle that may store the file.
    pub create: bool,
}

impl RequestOptions {
    /// Options for looking up an existing file.
    #[must_use]
    pub fn open(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            create: false,
        }
    }

    /// Options for a handle that may store the file.
    #[must_use]
    pub fn create(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            create: true,
        }
    }
}

/// Capability a [`FileHandle`] was issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleMode {
    /// May read the entry.
    Read,
    /// May read the entry and store it if absent.
    Write,
}

/// Capability bound to one content hash, issued after consent.
///
/// Holding a handle does not pin the entry: it can still be evicted by the
/// host, in which case [`FileHandle::read`] reports `NotFound`.
#[derive(Clone)]
pub struct FileHandle {
    hash: ContentHash,
    mode: HandleMode,
    store: ContentStore,
    verifier: Option<Arc<dyn ContentHasher>>,
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("hash", &self.hash)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl FileHandle {
    /// The hash this handle is bound to.
    #[must_use]
    pub const fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// The handle's capability.
    #[must_use]
    pub const fn mode(&self) -> HandleMode {
        self.mode
    }

    /// Reads the stored bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::NotFound`] if no entry is stored (evicted since
    /// the handle was issued, or never written through a create handle) and
    /// [`BrokerError::Storage`] if the store fails.
    pub async fn read(&self) -> BrokerResult<Vec<u8>> {
        self.store
            .get(&self.hash)
            .await?
            .ok_or_else(|| BrokerError::NotFound(self.hash.clone()))
    }

    /// Stores `bytes` under the handle's hash unless an entry exists.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::InvalidState`] on a read handle,
    /// [`ValidationError::HashMismatch`] when write verification is enabled
    /// and the bytes do not match, and [`BrokerError::Storage`] if the store
    /// fails.
    pub async fn write(&self, bytes: &[u8]) -> BrokerResult<PutOutcome> {
        if self.mode != HandleMode::Write {
            return Err(BrokerError::InvalidState(
                "handle was not requested with create",
            ));
        }
        if let Some(hasher) = &self.verifier {
            let computed = hasher.digest(self.hash.algorithm(), bytes);
            if computed != self.hash {
                return Err(ValidationError::HashMismatch {
                    expected: self.hash.clone(),
                    computed,
                }
                .into());
            }
        }
        Ok(self.store.put(&self.hash, bytes).await?)
    }
}

/// Mediates hash-keyed lookups and writes between mutually distrusting
/// origins.
///
/// Each call to [`StorageBroker::request_handle`] runs the permission state
/// machine before the content store is touched. The broker is meant to be
/// shared behind an `Arc`; all methods take `&self`.
pub struct StorageBroker {
    config: BrokerConfig,
    store: ContentStore,
    permissions: PermissionStateMachine,
    hasher: Arc<dyn ContentHasher>,
}

impl fmt::Debug for StorageBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageBroker")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

impl StorageBroker {
    /// Creates a broker with an empty consent ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails [`BrokerConfig::validate`].
    pub fn new(
        config: BrokerConfig,
        blob_store: Arc<dyn BlobStore>,
        prompter: Arc<dyn ConsentPrompter>,
    ) -> Result<Self, ConfigError> {
        Self::with_ledger(config, blob_store, prompter, Arc::new(ConsentLedger::new()))
    }

    /// Creates a broker over an existing ledger, e.g. one restored from a
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails [`BrokerConfig::validate`].
    pub fn with_ledger(
        config: BrokerConfig,
        blob_store: Arc<dyn BlobStore>,
        prompter: Arc<dyn ConsentPrompter>,
        ledger: Arc<ConsentLedger>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = ContentStore::new(blob_store, config.partition.as_str());
        let permissions = PermissionStateMachine::new(ledger, prompter, config.remember_denials);
        Ok(Self {
            config,
            store,
            permissions,
            hasher: Arc::new(Sha2Hasher),
        })
    }

    /// Replaces the content hasher used for write verification.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// The broker's configuration.
    #[must_use]
    pub const fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// The consent ledger.
    #[must_use]
    pub const fn ledger(&self) -> &Arc<ConsentLedger> {
        self.permissions.ledger()
    }

    /// The content store the broker writes to.
    #[must_use]
    pub const fn content_store(&self) -> &ContentStore {
        &self.store
    }

    /// Requests a handle for `hash` on behalf of `origin`.
    ///
    /// The description is validated first, then consent is evaluated, and
    /// only on allow is the store consulted:
    ///
    /// - without `create`, an absent entry fails with `NotFound`, a present
    ///   one yields a [`HandleMode::Read`] handle;
    /// - with `create`, a [`HandleMode::Write`] handle is returned whether or
    ///   not the entry exists.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Validation`] for a malformed description,
    /// [`BrokerError::NotAllowed`] when consent is refused or the prompt is
    /// abandoned, [`BrokerError::NotFound`] as above, and
    /// [`BrokerError::Storage`] if the store fails.
    pub async fn request_handle(
        &self,
        origin: &Origin,
        hash: &ContentHash,
        options: RequestOptions,
    ) -> BrokerResult<FileHandle> {
        let description = Description::parse(options.description)?;
        let request = PermissionRequest {
            origin,
            hash,
            description: &description,
            create: options.create,
        };

        let resolution = self
            .permissions
            .evaluate(request, self.store.contains(hash))
            .await?;
        if resolution.access == Access::Deny {
            log::debug!("{origin} refused {hash} ({:?})", resolution.source);
            return Err(BrokerError::NotAllowed {
                origin: origin.clone(),
                hash: hash.clone(),
            });
        }

        let mode = if options.create {
            HandleMode::Write
        } else if self.store.contains(hash).await? {
            HandleMode::Read
        } else {
            log::debug!("{origin} asked for {hash}, which is not stored");
            return Err(BrokerError::NotFound(hash.clone()));
        };

        log::debug!("issued {mode:?} handle for {hash} to {origin}");
        Ok(FileHandle {
            hash: hash.clone(),
            mode,
            store: self.store.clone(),
            verifier: self.config.verify_writes.then(|| Arc::clone(&self.hasher)),
        })
    }

    /// Forgets every consent decision of `origin`, as when the user clears
    /// that site's data. Stored content is shared and stays.
    pub fn clear_site_data(&self, origin: &Origin) -> usize {
        let removed = self.ledger().clear_origin(origin);
        log::info!("cleared {removed} consent records for {origin}");
        removed
    }

    /// Forgets every consent decision and deletes every stored entry.
    /// Returns the number of entries deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails; the ledger is cleared regardless.
    pub async fn clear_all(&self) -> BrokerResult<usize> {
        let records = self.ledger().clear();
        let entries = self.store.clear().await?;
        log::info!("cleared {records} consent records and {entries} entries");
        Ok(entries)
    }

    /// Lists stored hashes, for eviction tooling.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn entries(&self) -> BrokerResult<Vec<ContentHash>> {
        Ok(self.store.entries().await?)
    }

    /// Deletes one stored entry, for eviction tooling. Outstanding handles
    /// for the hash observe `NotFound` on their next read.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn evict(&self, hash: &ContentHash) -> BrokerResult<bool> {
        Ok(self.store.evict(hash).await?)
    }
}
