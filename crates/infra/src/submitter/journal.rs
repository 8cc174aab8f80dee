//! Submission journal: one entry per idempotency key.

use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tracechain_core::{Address, DispatchId};

use crate::ledger::{LedgerCall, TxHash};

/// Client-generated key tagging one logical submission across retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(pub Uuid);

impl IdempotencyKey {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for IdempotencyKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Accepted by the node; receipt not seen yet.
    Submitted,
    /// Mined successfully.
    Confirmed,
    /// Never got a hash, or mined and reverted.
    Failed { reason: String },
    /// Has a hash but the confirmation wait gave up.
    Unknown,
}

impl SubmissionStatus {
    /// The transaction may still land; resubmitting could double-apply it.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, SubmissionStatus::Submitted | SubmissionStatus::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub key: IdempotencyKey,
    pub from: Address,
    pub call: LedgerCall,
    pub tx_hash: Option<TxHash>,
    pub status: SubmissionStatus,
    pub attempts: u32,
    pub recorded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Dispatch a `confirmDelivery` call targets, if it is one.
    pub fn confirms(&self) -> Option<DispatchId> {
        match &self.call {
            LedgerCall::ConfirmDelivery { dispatch_id } => Some(*dispatch_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum JournalError {
    #[error("storage error: {0}")]
    Storage(String),
}

/// Resolved entries kept per journal unless configured otherwise.
pub const DEFAULT_RETENTION: usize = 1024;

/// In-memory journal, shared by every submission of one account.
///
/// Unresolved entries are never dropped. Confirmed and failed entries are kept
/// up to the retention bound, oldest resolution evicted first.
#[derive(Debug)]
pub struct SubmissionJournal {
    inner: RwLock<Entries>,
    retention: usize,
}

#[derive(Debug, Default)]
struct Entries {
    by_key: HashMap<IdempotencyKey, JournalEntry>,
    /// Resolved keys, oldest resolution first.
    resolved: VecDeque<IdempotencyKey>,
}

impl Entries {
    fn track(&mut self, key: IdempotencyKey, retention: usize) {
        self.resolved.retain(|k| *k != key);
        if self.by_key.get(&key).is_some_and(|e| !e.status.is_unresolved()) {
            self.resolved.push_back(key);
        }
        while self.resolved.len() > retention {
            if let Some(oldest) = self.resolved.pop_front() {
                self.by_key.remove(&oldest);
            }
        }
    }
}

impl Default for SubmissionJournal {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }
}

impl SubmissionJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: usize) -> Self {
        Self {
            inner: RwLock::new(Entries::default()),
            retention,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Entries>, JournalError> {
        self.inner
            .read()
            .map_err(|_| JournalError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Entries>, JournalError> {
        self.inner
            .write()
            .map_err(|_| JournalError::Storage("lock poisoned".to_string()))
    }

    /// Start (or restart) an attempt under `key`.
    pub fn begin(&self, key: IdempotencyKey, from: &Address, call: &LedgerCall) -> Result<JournalEntry, JournalError> {
        let now = Utc::now();
        let mut entries = self.write()?;

        let entry = entries.by_key.entry(key).or_insert_with(|| JournalEntry {
            key,
            from: from.clone(),
            call: call.clone(),
            tx_hash: None,
            status: SubmissionStatus::Submitted,
            attempts: 0,
            recorded_at: now,
            updated_at: now,
        });
        entry.tx_hash = None;
        entry.status = SubmissionStatus::Submitted;
        entry.attempts += 1;
        entry.updated_at = now;
        let started = entry.clone();

        entries.track(key, self.retention);
        Ok(started)
    }

    pub fn set_tx_hash(&self, key: IdempotencyKey, tx_hash: &TxHash) -> Result<(), JournalError> {
        self.update(key, |entry| entry.tx_hash = Some(tx_hash.clone()))
    }

    pub fn set_status(&self, key: IdempotencyKey, status: SubmissionStatus) -> Result<(), JournalError> {
        self.update(key, |entry| entry.status = status)
    }

    fn update(&self, key: IdempotencyKey, f: impl FnOnce(&mut JournalEntry)) -> Result<(), JournalError> {
        let mut entries = self.write()?;
        let Some(entry) = entries.by_key.get_mut(&key) else {
            return Ok(());
        };
        f(entry);
        entry.updated_at = Utc::now();
        entries.track(key, self.retention);
        Ok(())
    }

    pub fn get(&self, key: IdempotencyKey) -> Result<Option<JournalEntry>, JournalError> {
        Ok(self.read()?.by_key.get(&key).cloned())
    }

    /// An unresolved `confirmDelivery` for `dispatch_id`, if one exists.
    pub fn unresolved_confirmation(&self, dispatch_id: DispatchId) -> Result<Option<IdempotencyKey>, JournalError> {
        Ok(self
            .read()?
            .by_key
            .values()
            .filter(|e| e.confirms() == Some(dispatch_id) && e.status.is_unresolved())
            .map(|e| e.key)
            .min())
    }

    pub fn has_unresolved(&self) -> Result<bool, JournalError> {
        Ok(self.read()?.by_key.values().any(|e| e.status.is_unresolved()))
    }

    /// All entries, oldest key first.
    pub fn list(&self) -> Result<Vec<JournalEntry>, JournalError> {
        let mut out: Vec<_> = self.read()?.by_key.values().cloned().collect();
        out.sort_by_key(|e| e.key);
        Ok(out)
    }
}
