//! Axum router construction for the progress API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin clients.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the progress server.
///
/// See [`handlers`] for the endpoint table. `GET /ws/events` streams
/// session events as JSON text frames.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws/events", get(ws::ws_events))
        // Reads
        .route("/api/progress", get(handlers::get_progress))
        .route("/api/badges", get(handlers::list_badges))
        .route("/api/modules", get(handlers::list_modules))
        // Commands
        .route("/api/score", post(handlers::add_score))
        .route("/api/currency/add", post(handlers::add_currency))
        .route("/api/currency/spend", post(handlers::spend_currency))
        .route("/api/stats", post(handlers::update_stat))
        .route("/api/levels", post(handlers::complete_level))
        .route("/api/modules/{id}/upgrade", post(handlers::upgrade_module))
        .route("/api/rewards/claim", post(handlers::claim_reward))
        .route("/api/convert", post(handlers::convert))
        .route("/api/sync", post(handlers::sync))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
