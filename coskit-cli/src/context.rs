//! Builds a broker over the on-disk state and persists its ledger.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use coskit_core::consent::StaticPrompter;
use coskit_core::storage::{FileBlobStore, StoragePaths};
use coskit_core::{BrokerConfig, ConsentLedger, ConsentPrompter, StorageBroker};
use eyre::{eyre, WrapErr};

use crate::prompter::TerminalPrompter;
use crate::GlobalArgs;

/// A broker over `<data-dir>/coskit`.
pub struct Context {
    paths: StoragePaths,
    broker: Arc<StorageBroker>,
}

impl Context {
    /// Loads the configuration and ledger and opens the file-backed store.
    pub fn open(global: &GlobalArgs) -> eyre::Result<Self> {
        let paths = StoragePaths::new(data_root(global)?);
        let config = load_config(global.config.as_deref())?;
        let ledger = load_ledger(&paths.ledger_path())?;
        let prompter: Arc<dyn ConsentPrompter> = match global.auto_consent {
            Some(choice) => Arc::new(StaticPrompter::new(choice)),
            None => Arc::new(TerminalPrompter),
        };
        let store = Arc::new(FileBlobStore::new(paths.blobs_dir()));
        tracing::debug!(root = %paths.coskit_dir().display(), "opened broker state");

        let broker = StorageBroker::with_ledger(config, store, prompter, Arc::new(ledger))?;
        Ok(Self {
            paths,
            broker: Arc::new(broker),
        })
    }

    pub const fn broker(&self) -> &Arc<StorageBroker> {
        &self.broker
    }

    /// Writes the ledger snapshot next to the blob store.
    pub fn save_ledger(&self) -> eyre::Result<()> {
        save_ledger(self.broker.ledger(), &self.paths.ledger_path())
    }
}

fn data_root(global: &GlobalArgs) -> eyre::Result<PathBuf> {
    match &global.data_dir {
        Some(dir) => Ok(dir.clone()),
        None => dirs::data_dir()
            .ok_or_else(|| eyre!("no platform data directory, pass --data-dir")),
    }
}

fn load_config(path: Option<&Path>) -> eyre::Result<BrokerConfig> {
    let Some(path) = path else {
        return Ok(BrokerConfig::default());
    };
    let json = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    BrokerConfig::from_json(&json)
        .wrap_err_with(|| format!("invalid config {}", path.display()))
}

fn load_ledger(path: &Path) -> eyre::Result<ConsentLedger> {
    match fs::read(path) {
        Ok(bytes) => ConsentLedger::from_json(&bytes)
            .wrap_err_with(|| format!("invalid consent ledger {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(ConsentLedger::new()),
        Err(err) => {
            Err(err).wrap_err_with(|| format!("failed to read consent ledger {}", path.display()))
        }
    }
}

fn save_ledger(ledger: &ConsentLedger, path: &Path) -> eyre::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, ledger.to_json()?)
        .wrap_err_with(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).wrap_err_with(|| format!("failed to replace {}", path.display()))?;
    tracing::debug!(records = ledger.len(), path = %path.display(), "saved consent ledger");
    Ok(())
}
