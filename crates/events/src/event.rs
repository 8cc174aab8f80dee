use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fact recorded by the ledger or derived from it.
///
/// Events are immutable and append-only: a later event may supersede the meaning
/// of an earlier one, but never retracts it.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "MultiProductDispatched").
    fn event_type(&self) -> &'static str;

    /// When the event occurred (block time).
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// The event kinds the ledger contract emits.
///
/// Logs are queried per kind; there is no cursor beyond "all of them".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LedgerEventKind {
    ProductAdded,
    ProductDispatched,
    MultiProductDispatched,
    ProductAccepted,
    ReportForProduct,
}

impl LedgerEventKind {
    pub const ALL: [LedgerEventKind; 5] = [
        LedgerEventKind::ProductAdded,
        LedgerEventKind::ProductDispatched,
        LedgerEventKind::MultiProductDispatched,
        LedgerEventKind::ProductAccepted,
        LedgerEventKind::ReportForProduct,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LedgerEventKind::ProductAdded => "ProductAdded",
            LedgerEventKind::ProductDispatched => "ProductDispatched",
            LedgerEventKind::MultiProductDispatched => "MultiProductDispatched",
            LedgerEventKind::ProductAccepted => "ProductAccepted",
            LedgerEventKind::ReportForProduct => "ReportForProduct",
        }
    }
}

impl core::fmt::Display for LedgerEventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
