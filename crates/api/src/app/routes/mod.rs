use axum::{routing::get, Router};

pub mod actions;
pub mod panels;
pub mod system;

/// Router for every endpoint that acts as a wallet account.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/panels", panels::router())
        .nest("/actions", actions::router())
}
