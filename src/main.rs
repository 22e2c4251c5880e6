//! Bulk Transfer - HTTP service entry point
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌─────────────┐    ┌────────────┐
//! │  Config  │───▶│ Postgres │───▶│ Coordinator │───▶│  Gateway   │
//! │  (YAML)  │    │ (ready?) │    │ (PgLedger)  │    │  (axum)    │
//! └──────────┘    └──────────┘    └─────────────┘    └────────────┘
//! ```
//!
//! Usage: `bulk_transfer [--env dev] [--port 8080]`

use std::sync::Arc;

use anyhow::{Context, Result};

use bulk_transfer::config::AppConfig;
use bulk_transfer::db::Database;
use bulk_transfer::gateway::{self, AppState};
use bulk_transfer::logging::init_logging;
use bulk_transfer::storage::{PgLedgerStore, schema};
use bulk_transfer::transfer::TransferCoordinator;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown requested, draining in-flight requests");
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        config.gateway.port = port;
    }

    let _log_guard = init_logging(&config.logging);
    tracing::info!(env = %env, "Starting bulk_transfer");

    let db = Database::connect_lazy(&config.database).context("Invalid database configuration")?;
    db.wait_until_ready(config.database.ready_timeout())
        .await
        .context("Database not reachable")?;
    schema::ensure_schema(db.pool())
        .await
        .context("Failed to prepare database schema")?;
    tracing::info!("Schema ready");

    let db = Arc::new(db);
    let store = PgLedgerStore::new(db.pool().clone(), config.database.isolation);
    let coordinator = Arc::new(TransferCoordinator::new(Arc::new(store)));
    let state =
        AppState::new(coordinator, config.gateway.request_timeout()).with_database(db.clone());

    gateway::run_server(&config.gateway, Arc::new(state), shutdown_signal())
        .await
        .context("Gateway failed")?;

    db.close().await;
    tracing::info!("Stopped");
    Ok(())
}
