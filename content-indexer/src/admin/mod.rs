// Admin server - HTTP routes for index management
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tracing::info;

use self::state::AppState;
use crate::IndexingError;

/// Create the admin router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/indices",
            get(handlers::list_indices).put(handlers::replace_indices),
        )
        .route(
            "/indices/:name/rebuild",
            post(handlers::start_rebuild).get(handlers::rebuild_status),
        )
        .route("/queue/flush", post(handlers::flush_queue))
        .with_state(state)
}

/// Serve the admin API until the process exits.
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), IndexingError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| IndexingError::config(format!("Failed to bind admin address {}: {}", addr, e)))?;
    info!(addr = %addr, "Admin server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| IndexingError::config(format!("Admin server failed: {}", e)))
}
