#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

//! Cross-origin, content-addressed storage broker.
//!
//! Independent origins store and retrieve large blobs (model weights,
//! database files, WebAssembly modules) keyed by a content hash instead of by
//! origin-scoped storage. Every lookup or write is gated by a per-request
//! consent decision, and human-readable descriptions stay local to the origin
//! that supplied them.
//!
//! # Architecture
//!
//! - [`StorageBroker`] drives the permission flow and, on allow, the content
//!   store. It hands out [`FileHandle`]s that read or write one hash.
//! - [`consent`] holds the [`ConsentLedger`], the [`ConsentPrompter`]
//!   capability and the permission state machine.
//! - [`storage`] wraps a platform [`BlobStore`] with the no-overwrite,
//!   absent-is-not-an-error [`ContentStore`] contract.
//! - [`protocol`] and [`channel`] carry the message protocol spoken over the
//!   request channel.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use coskit_core::{
//!     consent::{ConsentChoice, StaticPrompter},
//!     storage::MemoryBlobStore,
//!     BrokerConfig, ContentHash, Origin, RequestOptions, StorageBroker,
//! };
//!
//! # tokio_test::block_on(async {
//! let broker = StorageBroker::new(
//!     BrokerConfig::default(),
//!     Arc::new(MemoryBlobStore::new()),
//!     Arc::new(StaticPrompter::new(ConsentChoice::AllowPersistent)),
//! )
//! .unwrap();
//!
//! let origin = Origin::parse("https://example.com").unwrap();
//! let bytes = b"model weights".to_vec();
//! let hash = ContentHash::sha256(&bytes);
//!
//! let handle = broker
//!     .request_handle(&origin, &hash, RequestOptions::create("Large AI Model"))
//!     .await
//!     .unwrap();
//! handle.write(&bytes).await.unwrap();
//!
//! let handle = broker
//!     .request_handle(&origin, &hash, RequestOptions::open("Large AI Model"))
//!     .await
//!     .unwrap();
//! assert_eq!(handle.read().await.unwrap(), bytes);
//! # });
//! ```

mod broker;
pub use broker::*;

pub mod channel;

pub mod config;
pub use config::{BrokerConfig, ConfigError};

pub mod consent;
pub use consent::{ConsentLedger, ConsentPrompter};

pub mod defaults;

mod error;
pub use error::*;

mod hash;
pub use hash::*;

pub mod logger;

pub mod protocol;

pub mod storage;
pub use storage::{BlobStore, ContentStore};

mod types;
pub use types::*;
