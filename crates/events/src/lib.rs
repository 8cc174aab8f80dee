//! Ledger events: raw logs, their normalized record shapes, and the normalizer
//! that maps one onto the other.

pub mod envelope;
pub mod event;
pub mod normalize;
pub mod records;

pub use envelope::{LogPosition, RawLedgerEvent};
pub use event::{Event, LedgerEventKind};
pub use normalize::{normalize, normalize_batch, MalformedEventError, NormalizedBatch, SkippedEvent};
pub use records::{
    AcceptanceRecord, DispatchKind, DispatchRecord, EntryRecord, NormalizedEvent, ReportRecord,
};
