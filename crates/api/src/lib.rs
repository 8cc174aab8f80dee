//! HTTP API: panel views and ledger actions over any `LedgerClient`.

pub mod app;
pub mod context;
pub mod middleware;
