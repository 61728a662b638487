//! Process-wide record of remembered consent decisions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use super::ConsentRecord;
use crate::defaults::LEDGER_SNAPSHOT_VERSION;
use crate::storage::{StorageError, StorageResult};
use crate::{ContentHash, Origin};

pub(crate) type LedgerKey = (Origin, ContentHash);

/// Remembered consent decisions keyed by `(origin, content hash)`.
///
/// A record never applies to any other origin or hash. Records persist until
/// they are overwritten by a later prompt or cleared; they do not expire.
#[derive(Debug, Default)]
pub struct ConsentLedger {
    records: Mutex<HashMap<LedgerKey, ConsentRecord>>,
}

/// Serialized form of a [`ConsentLedger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Snapshot format version.
    pub version: u32,
    /// All records, sorted by origin then hash.
    pub records: Vec<ConsentRecord>,
}

impl ConsentLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<LedgerKey, ConsentRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the record for `origin` and `hash`, if any.
    #[must_use]
    pub fn lookup(&self, origin: &Origin, hash: &ContentHash) -> Option<ConsentRecord> {
        self.guard().get(&(origin.clone(), hash.clone())).cloned()
    }

    /// Stores `record`, replacing and returning any previous record for the
    /// same origin and hash.
    pub fn record(&self, record: ConsentRecord) -> Option<ConsentRecord> {
        let key = (record.origin.clone(), record.hash.clone());
        self.guard().insert(key, record)
    }

    /// Removes every record for `origin` and returns how many were dropped.
    pub fn clear_origin(&self, origin: &Origin) -> usize {
        let mut records = self.guard();
        let before = records.len();
        records.retain(|(record_origin, _), _| record_origin != origin);
        before - records.len()
    }

    /// Removes every record and returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut records = self.guard();
        let count = records.len();
        records.clear();
        count
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Returns `true` if no decision is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records, sorted by origin then hash.
    #[must_use]
    pub fn records(&self) -> Vec<ConsentRecord> {
        let mut records: Vec<ConsentRecord> = self.guard().values().cloned().collect();
        records.sort_by(|a, b| (&a.origin, &a.hash).cmp(&(&b.origin, &b.hash)));
        records
    }

    /// Captures the ledger contents.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            version: LEDGER_SNAPSHOT_VERSION,
            records: self.records(),
        }
    }

    /// Rebuilds a ledger from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot version is not supported.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> StorageResult<Self> {
        if snapshot.version != LEDGER_SNAPSHOT_VERSION {
            return Err(StorageError::Serialization(format!(
                "unsupported ledger snapshot version {}",
                snapshot.version
            )));
        }
        let ledger = Self::new();
        for record in snapshot.records {
            ledger.record(record);
        }
        Ok(ledger)
    }

    /// Serializes the ledger as a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> StorageResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.snapshot())?)
    }

    /// Parses a JSON snapshot produced by [`ConsentLedger::to_json`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid snapshot.
    pub fn from_json(bytes: &[u8]) -> StorageResult<Self> {
        Self::from_snapshot(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::{ConsentChoice, ConsentOperation};

    fn record(origin: &str, content: &[u8], decision: ConsentChoice) -> ConsentRecord {
        ConsentRecord {
            origin: Origin::parse(origin).unwrap(),
            hash: ContentHash::sha256(content),
            operation: ConsentOperation::AccessContent,
            decision,
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_record_scoped_to_origin_and_hash() {
        let ledger = ConsentLedger::new();
        let a = record("https://a.example", b"model", ConsentChoice::AllowPersistent);
        ledger.record(a.clone());

        assert_eq!(ledger.lookup(&a.origin, &a.hash), Some(a.clone()));
        let other_origin = Origin::parse("https://b.example").unwrap();
        assert!(ledger.lookup(&other_origin, &a.hash).is_none());
        assert!(ledger
            .lookup(&a.origin, &ContentHash::sha256(b"other"))
            .is_none());
    }

    #[test]
    fn test_record_overwrites() {
        let ledger = ConsentLedger::new();
        let first = record("https://a.example", b"model", ConsentChoice::Deny);
        let second = record("https://a.example", b"model", ConsentChoice::AllowPersistent);

        assert!(ledger.record(first.clone()).is_none());
        assert_eq!(ledger.record(second.clone()), Some(first));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.lookup(&second.origin, &second.hash), Some(second));
    }

    #[test]
    fn test_clear_origin() {
        let ledger = ConsentLedger::new();
        ledger.record(record("https://a.example", b"1", ConsentChoice::AllowPersistent));
        ledger.record(record("https://a.example", b"2", ConsentChoice::Deny));
        ledger.record(record("https://b.example", b"1", ConsentChoice::AllowPersistent));

        let a = Origin::parse("https://a.example").unwrap();
        assert_eq!(ledger.clear_origin(&a), 2);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.clear(), 1);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let ledger = ConsentLedger::new();
        ledger.record(record("https://b.example", b"1", ConsentChoice::AllowPersistent));
        ledger.record(record("https://a.example", b"1", ConsentChoice::Deny));

        let bytes = ledger.to_json().unwrap();
        let restored = ConsentLedger::from_json(&bytes).unwrap();
        assert_eq!(restored.records(), ledger.records());
        assert_eq!(restored.records()[0].origin.as_str(), "https://a.example");
    }

    #[test]
    fn test_snapshot_version_checked() {
        let snapshot = LedgerSnapshot {
            version: LEDGER_SNAPSHOT_VERSION + 1,
            records: Vec::new(),
        };
        assert!(matches!(
            ConsentLedger::from_snapshot(snapshot),
            Err(StorageError::Serialization(_))
        ));
    }
}
