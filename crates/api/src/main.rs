use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use tracechain_api::app::{build_app, services::AppServices};
use tracechain_infra::{directory::HttpRolesDirectory, ledger::InMemoryLedger, TraceConfig};

const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracechain_observability::init();

    let config = TraceConfig::from_env().context("invalid configuration")?;

    // The dev server runs against the in-process ledger.
    let ledger = Arc::new(InMemoryLedger::new());
    let roles = Arc::new(
        HttpRolesDirectory::new(config.roles_url.clone(), DIRECTORY_TIMEOUT)
            .context("failed to build roles directory client")?,
    );

    let services = Arc::new(AppServices::new(ledger, roles, &config));
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        range_policy = ?config.range_policy,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
