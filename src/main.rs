//! Forex Clock Backend Server
//!
//! Thin bootstrap: load configuration, connect the database, start the
//! server, and stop it gracefully on SIGINT/SIGTERM.

use anyhow::Context;
use fxclock_backend::config::{Config, LogConfig};
use fxclock_backend::db::FxDb;
use fxclock_backend::server::Server;
use fxclock_backend::state::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    init_tracing(&config.log);
    info!("configuration loaded");

    // Any failure from here until serving is fatal: without a valid
    // configuration and database there is nothing to serve.
    let db = FxDb::connect(&config.db)
        .await
        .context("failed to establish database connection")?;

    let state = Arc::new(AppState::new(config, Arc::new(db)).context("failed to build state")?);
    let mut server = Server::new(Arc::clone(&state));

    let bound = server.start().context("failed to start server")?;
    let addr = bound.wait().await.context("failed to bind listener")?;
    info!(%addr, "forex-clock backend started");

    shutdown_signal().await;
    info!("shutdown signal received");

    server.stop().await.context("failed to stop server")?;
    state.db.close().await.context("failed to close database")?;

    Ok(())
}

/// Applies the configured log level and formatter.
fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log.level.clone()));
    let registry = tracing_subscriber::registry().with(filter);

    if log.formatter == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves on the first shutdown signal: SIGINT (Ctrl-C) or, on Unix,
/// SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}
