mod auth;
mod config;
mod error;
mod logging;
mod routes;

use anyhow::Context;
use reckon_import::Ingestor;
use reckon_storage::SqliteLedger;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::auth::TokenOwnerResolver;
use crate::config::Config;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    logging::init_logging(&config.logging.filter);

    let store = SqliteLedger::open(&config.database.path)
        .await
        .with_context(|| format!("opening database {}", config.database.path.display()))?;

    let resolver = TokenOwnerResolver::from_tokens(&config.owners)?;
    if resolver.is_empty() {
        warn!("no owners configured; every request will be rejected as unauthenticated");
    }

    let state = AppState::new(Ingestor::new(store, &config.ingest), resolver);
    let app = routes::router(state, config.server.max_upload_bytes);

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "reckon-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}
