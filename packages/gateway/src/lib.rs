pub mod config;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod state;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(handlers::ws::ws_handler))
        .route(
            "/@connections/{connection_id}",
            post(handlers::push::push_to_connection),
        )
        .route("/health", get(handlers::health))
        .with_state(state)
}
