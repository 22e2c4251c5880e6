//! HTTP Gateway
//!
//! Thin JSON transport over the transfer coordinator.
//!
//! | Route               | Handler                         |
//! |---------------------|---------------------------------|
//! | `POST /v1/transfers`| [`handlers::create_transfers`]  |
//! | `GET /health`       | [`handlers::health_check`]      |
//!
//! A client that disconnects mid-request drops the handler future, which
//! drops the open ledger scope and rolls it back.

pub mod handlers;
pub mod state;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
pub use state::AppState;

/// Build the gateway router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/v1/transfers", post(handlers::create_transfers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves
pub async fn run_server<F>(
    config: &GatewayConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.inspect_err(|e| {
        tracing::error!(%addr, error = %e, "Failed to bind gateway (port in use?)");
    })?;

    tracing::info!(%addr, "Gateway listening");
    tracing::info!("  POST http://{}/v1/transfers", addr);
    tracing::info!("  GET  http://{}/health", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
