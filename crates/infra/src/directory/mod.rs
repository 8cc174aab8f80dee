//! Roles directory: who an address is, for display only.
//!
//! The directory is a side table served by a small REST service. It is never
//! authoritative; ownership and custody always come from the ledger.

pub mod cache;
pub mod entry;
pub mod http;

pub use cache::{DirectoryCache, LabelResolver};
pub use entry::{DisplayLabel, RoleDirectoryEntry};
pub use http::{DirectoryError, HttpRolesDirectory, RolesSource};
