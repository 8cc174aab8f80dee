//! Infrastructure layer: ledger client, roles directory, read-side views,
//! action submission and panel sessions.

pub mod config;
pub mod directory;
pub mod ledger;
pub mod projections;
pub mod session;
pub mod submitter;

mod integration_tests;

pub use config::{ConfigError, TraceConfig};
pub use session::{DeliveredProduct, PanelSession, SessionError};
pub use submitter::{ActionSubmitter, Confirmed, Outcome, SubmitError};
