//! Main entry point for the portfolio authentication backend.
//!
//! Loads configuration, opens the database, wires the audit log, token
//! blacklist and mailer into shared state, and serves the Axum router.

mod api;
mod auth;
mod config;
mod database;
mod errors;
mod repositories;
mod services;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use auth::audit::{AuditLogger, FileAuditSink};
use auth::blacklist::{InMemoryBlacklist, TokenBlacklist, spawn_sweeper};
use auth::state::AppState;
use config::Config;
use database::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let db = Database::new(&config).await?;

    let audit = AuditLogger::new(Arc::new(
        FileAuditSink::open(&config.audit_log_path).await?,
    ));
    let blacklist: Arc<dyn TokenBlacklist> = Arc::new(InMemoryBlacklist::new());
    let sweeper = spawn_sweeper(
        blacklist.clone(),
        Duration::from_secs(config.blacklist_sweep_interval_seconds.max(1)),
    );

    let port = config.server_port;
    let production = config.is_production();
    let state = AppState::new(db.pool().clone(), config, blacklist, audit);
    let app = api::app_router(state)?;

    let bind_address = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;

    info!(
        "Starting auth server on port {} ({} mode)",
        port,
        if production { "production" } else { "development" }
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    sweeper.abort();
    db.close().await;
    Ok(())
}
