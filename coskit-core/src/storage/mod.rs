//! Content-addressed storage: the platform [`BlobStore`] interface, the
//! [`ContentStore`] adapter the broker relies on, and bundled backends.

mod content;
pub mod error;
#[cfg(all(feature = "fs-store", not(target_arch = "wasm32")))]
mod fs;
mod memory;
mod paths;
mod traits;

pub use content::{ContentStore, PutOutcome};
pub use error::{StorageError, StorageResult};
#[cfg(all(feature = "fs-store", not(target_arch = "wasm32")))]
pub use fs::FileBlobStore;
pub use memory::MemoryBlobStore;
pub use paths::StoragePaths;
pub use traits::BlobStore;
