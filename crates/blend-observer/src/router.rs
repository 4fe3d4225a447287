//! Axum router construction for the HTTP API.
//!
//! Assembles all routes into a single [`Router`] with CORS middleware
//! enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /health` -- liveness probe
/// - `GET /api/sample` -- demonstration dataset
/// - `POST /api/validate` -- table validation report
/// - `POST /api/run` -- blend run
/// - `POST /api/optimize` -- discharge fraction search
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        // REST API
        .route("/api/sample", get(handlers::sample))
        .route("/api/validate", post(handlers::validate))
        .route("/api/run", post(handlers::run_blend))
        .route("/api/optimize", post(handlers::optimize_blend))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
