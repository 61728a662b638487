//! Per-request permission evaluation.
//!
//! ```text
//! Idle -> Evaluating -> Resolved            (remembered decision)
//! Idle -> Evaluating -> Prompting -> Resolved
//! ```
//!
//! Evaluations for the same `(origin, hash)` pair are serialized from the
//! ledger read to the ledger write. Different pairs never wait on each other.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use super::ledger::LedgerKey;
use super::{
    ConsentChoice, ConsentLedger, ConsentOperation, ConsentPrompter, ConsentRecord,
    PromptError, PromptRequest,
};
use crate::storage::StorageResult;
use crate::{ContentHash, Description, Origin};

/// Outcome of a resolved evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The broker may proceed to the blob store.
    Allow,
    /// The request fails with `NotAllowedError`.
    Deny,
}

/// States an evaluation moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// Not started.
    Idle,
    /// Consulting the ledger.
    Evaluating,
    /// Waiting for the user.
    Prompting,
    /// Finished.
    Resolved(Access),
}

/// Where a resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// A remembered ledger record; no prompt was shown.
    Ledger(ConsentChoice),
    /// A prompt answered by the user.
    Prompt(ConsentChoice),
    /// A prompt that ended without an answer. Nothing was recorded.
    Abandoned,
}

/// Result of [`PermissionStateMachine::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Whether the request may proceed.
    pub access: Access,
    /// How the decision was reached.
    pub source: DecisionSource,
}

impl Resolution {
    /// Whether the user was shown a prompt.
    #[must_use]
    pub const fn prompted(&self) -> bool {
        !matches!(self.source, DecisionSource::Ledger(_))
    }
}

/// The inputs of one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct PermissionRequest<'a> {
    /// Requesting origin.
    pub origin: &'a Origin,
    /// Requested hash.
    pub hash: &'a ContentHash,
    /// The origin's label for the file, shown in the prompt.
    pub description: &'a Description,
    /// Whether the origin asked for a create-capable handle.
    pub create: bool,
}

/// One async lock per `(origin, hash)` pair, pruned when idle.
#[derive(Debug, Default)]
struct KeyLocks {
    locks: Mutex<HashMap<LedgerKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    fn get(&self, key: LedgerKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(key).or_default())
    }
}

/// Decides, per request, whether to allow, deny or prompt, and records the
/// outcome in the [`ConsentLedger`].
pub struct PermissionStateMachine {
    ledger: Arc<ConsentLedger>,
    prompter: Arc<dyn ConsentPrompter>,
    remember_denials: bool,
    locks: KeyLocks,
}

impl std::fmt::Debug for PermissionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionStateMachine")
            .field("remember_denials", &self.remember_denials)
            .field("ledger_records", &self.ledger.len())
            .finish_non_exhaustive()
    }
}

impl PermissionStateMachine {
    /// Creates a state machine over `ledger` that asks `prompter` when no
    /// decision is remembered.
    #[must_use]
    pub fn new(
        ledger: Arc<ConsentLedger>,
        prompter: Arc<dyn ConsentPrompter>,
        remember_denials: bool,
    ) -> Self {
        Self {
            ledger,
            prompter,
            remember_denials,
            locks: KeyLocks::default(),
        }
    }

    /// The ledger this machine reads and writes.
    #[must_use]
    pub const fn ledger(&self) -> &Arc<ConsentLedger> {
        &self.ledger
    }

    /// Evaluates `request`.
    ///
    /// `exists` is only awaited when a prompt is needed; it selects the
    /// prompt template and the recorded [`ConsentOperation`].
    ///
    /// Dropping the returned future abandons the evaluation without touching
    /// the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error only if the existence probe fails.
    pub async fn evaluate<F>(&self, request: PermissionRequest<'_>, exists: F) -> StorageResult<Resolution>
    where
        F: Future<Output = StorageResult<bool>> + Send,
    {
        let mut state = PermissionState::Idle;
        let lock = self.locks.get((request.origin.clone(), request.hash.clone()));
        let _guard = lock.lock().await;

        transition(&mut state, PermissionState::Evaluating, &request);
        if let Some(choice) = self.remembered(request.origin, request.hash) {
            let access = access_for(choice);
            transition(&mut state, PermissionState::Resolved(access), &request);
            return Ok(Resolution {
                access,
                source: DecisionSource::Ledger(choice),
            });
        }

        let exists_already = exists.await?;
        transition(&mut state, PermissionState::Prompting, &request);
        let prompt = PromptRequest {
            origin: request.origin.clone(),
            description: request.description.clone(),
            exists_already,
        };
        let choice = match self.prompter.prompt(&prompt).await {
            Ok(choice) => choice,
            Err(PromptError::Dismissed) => {
                log::info!("prompt for {} on {} dismissed", request.origin, request.hash);
                transition(&mut state, PermissionState::Resolved(Access::Deny), &request);
                return Ok(abandoned());
            }
            Err(err @ PromptError::Unavailable(_)) => {
                log::warn!("could not prompt {} for {}: {err}", request.origin, request.hash);
                transition(&mut state, PermissionState::Resolved(Access::Deny), &request);
                return Ok(abandoned());
            }
        };

        if self.should_remember(choice) {
            self.ledger.record(ConsentRecord {
                origin: request.origin.clone(),
                hash: request.hash.clone(),
                operation: ConsentOperation::classify(request.create, exists_already),
                decision: choice,
                timestamp: unix_now(),
            });
        }
        log::info!("{} answered {choice} for {}", request.origin, request.hash);

        let access = access_for(choice);
        transition(&mut state, PermissionState::Resolved(access), &request);
        Ok(Resolution {
            access,
            source: DecisionSource::Prompt(choice),
        })
    }

    fn remembered(&self, origin: &Origin, hash: &ContentHash) -> Option<ConsentChoice> {
        let record = self.ledger.lookup(origin, hash)?;
        match record.decision {
            ConsentChoice::AllowPersistent => Some(record.decision),
            ConsentChoice::Deny if self.remember_denials => Some(record.decision),
            // Denials written under a different policy, or stray allow-once
            // records from an imported snapshot, do not skip the prompt.
            ConsentChoice::Deny | ConsentChoice::AllowOnce => None,
        }
    }

    const fn should_remember(&self, choice: ConsentChoice) -> bool {
        match choice {
            ConsentChoice::AllowPersistent => true,
            ConsentChoice::Deny => self.remember_denials,
            ConsentChoice::AllowOnce => false,
        }
    }
}

const fn access_for(choice: ConsentChoice) -> Access {
    if choice.is_allow() {
        Access::Allow
    } else {
        Access::Deny
    }
}

const fn abandoned() -> Resolution {
    Resolution {
        access: Access::Deny,
        source: DecisionSource::Abandoned,
    }
}

fn transition(state: &mut PermissionState, next: PermissionState, request: &PermissionRequest<'_>) {
    log::trace!(
        "permission {} / {}: {state:?} -> {next:?}",
        request.origin,
        request.hash
    );
    *state = next;
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::consent::StaticPrompter;

    struct Fixture {
        origin: Origin,
        hash: ContentHash,
        description: Description,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                origin: Origin::parse("https://a.example").unwrap(),
                hash: ContentHash::sha256(b"model"),
                description: Description::parse("Large AI Model").unwrap(),
            }
        }

        fn request(&self, create: bool) -> PermissionRequest<'_> {
            PermissionRequest {
                origin: &self.origin,
                hash: &self.hash,
                description: &self.description,
                create,
            }
        }
    }

    fn machine(choice: ConsentChoice, remember_denials: bool) -> (Arc<StaticPrompter>, PermissionStateMachine) {
        let prompter = Arc::new(StaticPrompter::new(choice));
        let machine = PermissionStateMachine::new(
            Arc::new(ConsentLedger::new()),
            prompter.clone(),
            remember_denials,
        );
        (prompter, machine)
    }

    #[tokio::test]
    async fn test_allow_persistent_is_remembered() {
        let fixture = Fixture::new();
        let (prompter, machine) = machine(ConsentChoice::AllowPersistent, false);

        let first = machine.evaluate(fixture.request(false), async { Ok(true) }).await.unwrap();
        assert_eq!(first.access, Access::Allow);
        assert!(first.prompted());

        let second = machine.evaluate(fixture.request(false), async { Ok(true) }).await.unwrap();
        assert_eq!(second.source, DecisionSource::Ledger(ConsentChoice::AllowPersistent));
        assert_eq!(prompter.prompt_count(), 1);

        let record = machine.ledger().lookup(&fixture.origin, &fixture.hash).unwrap();
        assert_eq!(record.operation, ConsentOperation::AccessContent);
    }

    #[tokio::test]
    async fn test_allow_once_is_not_remembered() {
        let fixture = Fixture::new();
        let (prompter, machine) = machine(ConsentChoice::AllowOnce, true);

        for _ in 0..2 {
            let resolution = machine.evaluate(fixture.request(false), async { Ok(false) }).await.unwrap();
            assert_eq!(resolution.access, Access::Allow);
        }
        assert_eq!(prompter.prompt_count(), 2);
        assert!(machine.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_deny_remembered_only_when_configured() {
        let fixture = Fixture::new();

        let (prompter, forgetful) = machine(ConsentChoice::Deny, false);
        for _ in 0..2 {
            let resolution = forgetful.evaluate(fixture.request(false), async { Ok(false) }).await.unwrap();
            assert_eq!(resolution.access, Access::Deny);
        }
        assert_eq!(prompter.prompt_count(), 2);
        assert!(forgetful.ledger().is_empty());

        let (prompter, remembering) = machine(ConsentChoice::Deny, true);
        for _ in 0..2 {
            let resolution = remembering.evaluate(fixture.request(true), async { Ok(false) }).await.unwrap();
            assert_eq!(resolution.access, Access::Deny);
        }
        assert_eq!(prompter.prompt_count(), 1);
        let record = remembering.ledger().lookup(&fixture.origin, &fixture.hash).unwrap();
        assert_eq!(record.operation, ConsentOperation::Create);
    }

    #[tokio::test]
    async fn test_existence_probe_skipped_on_fast_path() {
        let fixture = Fixture::new();
        let (_, machine) = machine(ConsentChoice::AllowPersistent, false);
        machine.evaluate(fixture.request(false), async { Ok(true) }).await.unwrap();

        let probed = AtomicUsize::new(0);
        machine
            .evaluate(fixture.request(false), async {
                probed.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            })
            .await
            .unwrap();
        assert_eq!(probed.load(Ordering::SeqCst), 0);
    }

    struct DismissingPrompter;

    #[async_trait]
    impl ConsentPrompter for DismissingPrompter {
        async fn prompt(&self, _request: &PromptRequest) -> Result<ConsentChoice, PromptError> {
            Err(PromptError::Dismissed)
        }
    }

    #[tokio::test]
    async fn test_dismissed_prompt_records_nothing() {
        let fixture = Fixture::new();
        let machine = PermissionStateMachine::new(
            Arc::new(ConsentLedger::new()),
            Arc::new(DismissingPrompter),
            true,
        );

        let resolution = machine.evaluate(fixture.request(false), async { Ok(false) }).await.unwrap();
        assert_eq!(resolution.access, Access::Deny);
        assert_eq!(resolution.source, DecisionSource::Abandoned);
        assert!(machine.ledger().is_empty());
    }

    struct PendingPrompter;

    #[async_trait]
    impl ConsentPrompter for PendingPrompter {
        async fn prompt(&self, _request: &PromptRequest) -> Result<ConsentChoice, PromptError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_dropped_evaluation_records_nothing_and_releases_key() {
        let fixture = Fixture::new();
        let machine = PermissionStateMachine::new(
            Arc::new(ConsentLedger::new()),
            Arc::new(PendingPrompter),
            true,
        );

        let outcome = tokio::time::timeout(
            Duration::from_millis(20),
            machine.evaluate(fixture.request(false), async { Ok(false) }),
        )
        .await;
        assert!(outcome.is_err());
        assert!(machine.ledger().is_empty());

        // The key lock was released with the dropped future.
        machine.ledger().record(ConsentRecord {
            origin: fixture.origin.clone(),
            hash: fixture.hash.clone(),
            operation: ConsentOperation::AccessContent,
            decision: ConsentChoice::AllowPersistent,
            timestamp: 0,
        });
        let resolution = machine.evaluate(fixture.request(false), async { Ok(true) }).await.unwrap();
        assert_eq!(resolution.access, Access::Allow);
    }
}
