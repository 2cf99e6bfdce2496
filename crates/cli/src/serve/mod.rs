//! `revstore serve` -- HTTP JSON API over the upsert engine.
//!
//! Endpoints:
//! - GET /health                               - Server status (exempt from auth)
//! - PUT /documents                            - Upsert a document
//! - GET /documents/{resource_id}              - Current revision of a resource
//! - GET /documents/{resource_id}/history      - Archived revisions of a resource
//!
//! `PUT /documents` takes the document as the body. An `If-Match` header
//! supplies the expected version; `allowCreate` (default true) and
//! `keepHistory` (default false) are query parameters.
//!
//! If `REVSTORE_API_KEY` is set, every endpoint except /health requires
//! `Authorization: Bearer <key>` or `X-API-Key: <key>`.

mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{middleware as axum_middleware, Json, Router};
use revstore_engine::UpsertEngine;
use revstore_storage::MemoryStore;
use tower_http::cors::{Any, CorsLayer};

use self::handlers::{
    handle_get_document, handle_get_history, handle_health, handle_not_found, handle_put_document,
};
use self::middleware::auth_middleware;
use self::state::AppState;
use crate::config::RevstoreConfig;

/// Maximum request body size: 4 MB.
const MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Build the router over the given state.
fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/documents", put(handle_put_document))
        .route("/documents/{resource_id}", get(handle_get_document))
        .route("/documents/{resource_id}/history", get(handle_get_history))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server on the given port over a fresh in-memory store.
pub async fn start_server(
    port: u16,
    config: RevstoreConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let api_key = std::env::var("REVSTORE_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    }

    let state = Arc::new(AppState {
        store: MemoryStore::with_config(config.store),
        engine: UpsertEngine::new(config.engine),
        api_key,
    });
    tracing::info!(
        max_attempts = state.engine.config().retry.max_attempts,
        max_operations_per_snapshot = ?state.store.config().max_operations_per_snapshot,
        "engine configured"
    );
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "revstore listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
