use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::LedgerEventKind;

/// Where a log sits in the chain. Orders logs in emission order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    pub block_number: u64,
    pub log_index: u32,
}

impl core::fmt::Display for LogPosition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

/// A raw event log exactly as the ledger client delivers it.
///
/// `args` holds the decoded event arguments by name. Integer arguments are
/// ledger-native (256-bit) and usually arrive as decimal strings; small values
/// may arrive as JSON numbers. Nothing here is validated; that is the
/// normalizer's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLedgerEvent {
    kind: LedgerEventKind,
    position: LogPosition,
    tx_hash: String,
    args: Map<String, JsonValue>,
}

impl RawLedgerEvent {
    pub fn new(
        kind: LedgerEventKind,
        position: LogPosition,
        tx_hash: impl Into<String>,
        args: Map<String, JsonValue>,
    ) -> Self {
        Self {
            kind,
            position,
            tx_hash: tx_hash.into(),
            args,
        }
    }

    pub fn kind(&self) -> LedgerEventKind {
        self.kind
    }

    pub fn position(&self) -> LogPosition {
        self.position
    }

    pub fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    pub fn args(&self) -> &Map<String, JsonValue> {
        &self.args
    }

    pub fn arg(&self, name: &str) -> Option<&JsonValue> {
        self.args.get(name)
    }
}
