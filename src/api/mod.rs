//! HTTP streaming transport.
//!
//! Provides two endpoints:
//! - `POST /run` streams a fresh simulation run as server-sent events
//! - `GET /health` liveness probe

mod compress;
mod error;
mod handlers;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use compress::{compress_meters, decompress_meters};
pub use error::ApiError;

use crate::config::ScenarioConfig;
use crate::telemetry::shutdown_signal;

/// Application state shared across all request handlers.
///
/// Every run builds its own engine from `scenario`; nothing is shared
/// between runs.
pub struct AppState {
    /// Scenario used for every run; requests choose only size and start.
    pub scenario: ScenarioConfig,
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared application state
///
/// # Returns
///
/// Configured `Router` with permissive CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/run", post(handlers::run))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds to the given address and serves the API until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
