//! # Parley Server
//!
//! TCP chat server with a UDP presence side channel.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (reads ./parley.toml when present)
//! parley
//!
//! # Run with environment variables
//! PARLEY_PORT=8888 PARLEY_HOST=0.0.0.0 parley
//! ```

use anyhow::{Context, Result};
use parley_core::{History, Registry, Router, RouterConfig};
use parley_server::server::{ChatServer, ServerState};
use parley_server::{config, metrics, BcryptAuthenticator, PresencePublisher, SqliteStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Parley server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            tracing::error!("Failed to start metrics server: {}", e);
        }
    }

    // Storage, history, and authentication
    let store = Arc::new(
        SqliteStore::open(&config.database.path)
            .with_context(|| format!("failed to open database {}", config.database.path))?,
    );
    let history = Arc::new(History::new(config.history.capacity, store.clone()));
    let auth = Arc::new(BcryptAuthenticator::new(store));

    // Registry and router
    let registry = Arc::new(Registry::new());
    let router = Arc::new(Router::start(
        RouterConfig {
            queue_capacity: config.router.queue_capacity,
            workers: config.router.workers,
        },
        Arc::clone(&registry),
        Arc::clone(&history),
    ));

    // TCP server
    let state = Arc::new(ServerState {
        registry: Arc::clone(&registry),
        router,
        history,
        auth,
        tcp_timeout: config.tcp_timeout(),
        heartbeat_interval: config.heartbeat_interval(),
    });
    let server = Arc::new(
        ChatServer::bind(config.bind_addr()?, state)
            .await
            .context("failed to bind TCP listener")?,
    );

    // UDP presence publisher
    let publisher = PresencePublisher::new(
        config.presence_addr()?,
        config.broadcast_interval(),
        config.presence_send_timeout(),
        move || registry.usernames(),
    );
    let presence_shutdown = server.shutdown_signal();
    tokio::spawn(async move {
        if let Err(e) = publisher.run(presence_shutdown).await {
            tracing::error!("Presence publisher failed: {}", e);
        }
    });

    let accept_loop = tokio::spawn(Arc::clone(&server).run());

    // Graceful shutdown on ctrl-c
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    server.shutdown().await;
    let _ = accept_loop.await;

    Ok(())
}
