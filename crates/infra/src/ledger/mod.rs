//! Ledger boundary.
//!
//! The traceability contract is the system of record. This module defines the
//! client abstraction the rest of the crate talks to, plus an in-memory ledger
//! implementing the contract's rules for tests and the dev server.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLedger;
pub use r#trait::{
    DispatchItem, LedgerCall, LedgerClient, LedgerError, LifeCycleSnapshot, Receipt, ReceiptStatus,
    TxHash,
};
