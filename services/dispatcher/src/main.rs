//! depfleet dispatcher binary.
//!
//! Wires configuration, tracing, the object store, and the dispatch worker
//! together and runs until interrupted.

use std::sync::Arc;

use anyhow::Result;
use depfleet_dispatcher::{config, DispatchWorker};
use depfleet_store::MemoryStore;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to DEPFLEET_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting depfleet dispatcher");
    info!(
        interval_secs = config.reconcile_interval.as_secs(),
        "Configuration loaded"
    );

    // In-process store for standalone operation; production deployments
    // substitute a real backend behind the same trait.
    let store = Arc::new(MemoryStore::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = DispatchWorker::new(store, config.reconcile_interval);
    let worker_handle = tokio::spawn(async move {
        worker.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
    worker_handle.await?;

    info!("Dispatcher stopped");
    Ok(())
}
