use std::time::Duration;

use thiserror::Error;

use tracechain_core::{DispatchId, DomainError};

use super::journal::{IdempotencyKey, JournalError};
use crate::ledger::{LedgerError, TxHash};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Rejected locally; nothing was read or sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A read-only pre-check failed; nothing was sent.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The node refused the transaction or it reverted.
    #[error("submission {key} failed: {reason}")]
    Submission { key: IdempotencyKey, reason: String },

    /// Submitted, but not mined within the bound. It may still land.
    #[error("submission {key} ({tx_hash}) not confirmed within {timeout:?}")]
    TimedOut {
        key: IdempotencyKey,
        tx_hash: TxHash,
        timeout: Duration,
    },

    #[error("delivery confirmation for dispatch {dispatch_id} is already in flight")]
    InFlight {
        dispatch_id: DispatchId,
        key: Option<IdempotencyKey>,
    },

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("unknown idempotency key {0}")]
    UnknownKey(IdempotencyKey),
}

impl SubmitError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Key to pass to `retry`, when retrying makes sense.
    pub fn key(&self) -> Option<IdempotencyKey> {
        match self {
            SubmitError::Submission { key, .. } | SubmitError::TimedOut { key, .. } => Some(*key),
            SubmitError::InFlight { key, .. } => *key,
            _ => None,
        }
    }
}

impl From<DomainError> for SubmitError {
    fn from(err: DomainError) -> Self {
        SubmitError::Validation(err.to_string())
    }
}

impl From<LedgerError> for SubmitError {
    fn from(err: LedgerError) -> Self {
        SubmitError::Unavailable(err.to_string())
    }
}

impl From<JournalError> for SubmitError {
    fn from(err: JournalError) -> Self {
        SubmitError::Unavailable(err.to_string())
    }
}
