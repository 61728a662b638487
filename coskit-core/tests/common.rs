//! Common test utilities shared across integration tests.
#![allow(dead_code, missing_docs)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coskit_core::consent::{ConsentChoice, ConsentPrompter, PromptError, PromptRequest};
use coskit_core::storage::{MemoryBlobStore, StorageResult};
use coskit_core::{BlobStore, BrokerConfig, ContentHash, Origin, StorageBroker};

/// Answers prompts from a queue and records every request it was shown.
///
/// `None` in the queue dismisses the prompt. Once the queue is empty every
/// prompt is answered with `fallback`.
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Option<ConsentChoice>>>,
    fallback: ConsentChoice,
    shown: Mutex<Vec<PromptRequest>>,
}

impl ScriptedPrompter {
    pub fn always(choice: ConsentChoice) -> Arc<Self> {
        Self::scripted([], choice)
    }

    pub fn scripted(
        answers: impl IntoIterator<Item = Option<ConsentChoice>>,
        fallback: ConsentChoice,
    ) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into_iter().collect()),
            fallback,
            shown: Mutex::new(Vec::new()),
        })
    }

    pub fn prompt_count(&self) -> usize {
        self.shown.lock().unwrap().len()
    }

    pub fn shown(&self) -> Vec<PromptRequest> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConsentPrompter for ScriptedPrompter {
    async fn prompt(&self, request: &PromptRequest) -> Result<ConsentChoice, PromptError> {
        self.shown.lock().unwrap().push(request.clone());
        match self.answers.lock().unwrap().pop_front() {
            Some(Some(choice)) => Ok(choice),
            Some(None) => Err(PromptError::Dismissed),
            None => Ok(self.fallback),
        }
    }
}

/// Waits before handing the prompt to a [`ScriptedPrompter`].
pub struct DelayedPrompter {
    inner: Arc<ScriptedPrompter>,
    delay: Duration,
}

impl DelayedPrompter {
    pub fn new(inner: Arc<ScriptedPrompter>, delay: Duration) -> Arc<Self> {
        Arc::new(Self { inner, delay })
    }
}

#[async_trait]
impl ConsentPrompter for DelayedPrompter {
    async fn prompt(&self, request: &PromptRequest) -> Result<ConsentChoice, PromptError> {
        tokio::time::sleep(self.delay).await;
        self.inner.prompt(request).await
    }
}

/// Prompter that never answers.
pub struct PendingPrompter;

#[async_trait]
impl ConsentPrompter for PendingPrompter {
    async fn prompt(&self, _request: &PromptRequest) -> Result<ConsentChoice, PromptError> {
        std::future::pending().await
    }
}

/// Memory store that counts every backend call.
#[derive(Default)]
pub struct CountingBlobStore {
    pub inner: MemoryBlobStore,
    calls: AtomicUsize,
}

impl CountingBlobStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for CountingBlobStore {
    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.touch();
        self.inner.read(key).await
    }

    async fn create(&self, key: &str, bytes: &[u8]) -> StorageResult<bool> {
        self.touch();
        self.inner.create(key, bytes).await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.touch();
        self.inner.delete(key).await
    }

    async fn keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.touch();
        self.inner.keys(prefix).await
    }

    async fn contains(&self, key: &str) -> StorageResult<bool> {
        self.touch();
        self.inner.contains(key).await
    }
}

pub fn broker_with(
    config: BrokerConfig,
    store: Arc<dyn BlobStore>,
    prompter: Arc<dyn ConsentPrompter>,
) -> Arc<StorageBroker> {
    Arc::new(StorageBroker::new(config, store, prompter).unwrap())
}

pub fn memory_broker(prompter: Arc<dyn ConsentPrompter>) -> (Arc<MemoryBlobStore>, Arc<StorageBroker>) {
    let store = Arc::new(MemoryBlobStore::new());
    let broker = broker_with(BrokerConfig::default(), store.clone(), prompter);
    (store, broker)
}

pub fn origin(origin: &str) -> Origin {
    Origin::parse(origin).expect("valid origin")
}

pub fn model() -> (Vec<u8>, ContentHash) {
    let bytes = b"large ai model weights".to_vec();
    let hash = ContentHash::sha256(&bytes);
    (bytes, hash)
}
