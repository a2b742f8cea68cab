//! HTTP surface of the operation relay.

pub mod api;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use webrelay::OperationQueue;

pub const RELAY_PATH: &str = "/api/browser-control-real";

/// Request body cap; submitted screenshots arrive as data URLs.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<OperationQueue>,
}

impl AppState {
    pub fn new(queue: Arc<OperationQueue>) -> Self {
        Self { queue }
    }
}

pub fn build_router(state: AppState, cors: bool) -> Router {
    let mut app = Router::new()
        // Health check
        .route("/api/health", get(api::health))
        // Script generation and queue access share one path
        .route(RELAY_PATH, post(api::relay_post).get(api::relay_get))
        .route(
            &format!("{RELAY_PATH}/operations"),
            post(api::enqueue_operation),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }
    app
}
