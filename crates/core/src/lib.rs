//! `tracechain-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by every other crate:
//! ledger-assigned identifiers, account addresses, the domain error model and the
//! aggregate traits. No IO lives here.

pub mod address;
pub mod aggregate;
pub mod error;
pub mod id;

pub use address::Address;
pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{DomainError, DomainResult};
pub use id::{BoxId, DispatchId, ProductId};
