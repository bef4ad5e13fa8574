//! spy-relay server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use spy_relay::api;
use spy_relay::app_state::AppState;
use spy_relay::config::{LogFormat, RelayConfig};
use spy_relay::domain::RoomRegistry;
use spy_relay::service::Relay;
use spy_relay::storage::LocalLogStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RelayConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting spy-relay");

    // Build domain + service layer
    let registry = Arc::new(RoomRegistry::with_limits(config.registry_limits()));
    let relay = Arc::new(Relay::new(registry, &config));
    let reaper = relay.spawn_reaper();

    let storage = LocalLogStorage::open(&config.log_storage_dir)
        .await
        .context("failed to open log storage")?;

    let app_state = AppState {
        relay: Arc::clone(&relay),
        storage: Arc::new(storage),
    };
    let app = api::build_router(app_state, &config);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let shutdown_relay = Arc::clone(&relay);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown signal received");
            // Evicting members lets open WebSocket sessions finish.
            shutdown_relay.shutdown().await;
        })
        .await?;

    relay.shutdown().await;
    let _ = reaper.await;
    tracing::info!("spy-relay stopped");
    Ok(())
}
