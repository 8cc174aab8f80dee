//! Read-side views built from normalized ledger events.
//!
//! All views are pure functions of their input:
//! - **Rebuildable**: recomputed from the full event set on every refresh
//! - **Order-stable**: input order never changes the output
//! - **Per viewer**: the reconciliation state is built for one account and stage

pub mod dispatches;
pub mod entries;
pub mod reconciler;
pub mod state;

pub use dispatches::{
    accepted_by, dispatch_view, incoming_to, reports_by, sales_by, sent_by, track_product, AggregateError,
};
pub use entries::{entry_view, BoxEntry};
pub use reconciler::{Classification, ClassifiedDispatch, InvalidReason, RangePolicy, StatusReconciler};
pub use state::ReconciliationState;
