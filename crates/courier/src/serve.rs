//! The serve command
//!
//! Wires the standalone daemon together: configuration, the in-memory store
//! and broker, the push manager (rehydrated from the catalog), and the Axum
//! server with graceful shutdown.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use courier_api::{AppState, build_router};
use courier_broker::{Broker, MemoryBroker};
use courier_config::Config;
use courier_push::Manager;
use courier_store::{MemoryStore, Store};

pub async fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    // Standalone mode: the in-memory reference store and broker, seeded with
    // the demo catalog. A deployment against real backends swaps these two
    // lines for its own Store/Broker implementations.
    let store: Arc<dyn Store> = Arc::new(MemoryStore::seeded());
    let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::new());

    let manager = Arc::new(Manager::with_request_timeout(
        Arc::clone(&store),
        Arc::clone(&broker),
        config.push.request_timeout(),
    ));
    manager.rehydrate().await;

    let state = AppState::new(store, broker, Arc::clone(&manager))
        .with_per_resource_auth(config.server.per_resource_auth);
    let app = build_router(state);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(
        addr = %addr,
        per_resource_auth = config.server.per_resource_auth,
        "courier listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("courier shut down");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("cannot listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
}
