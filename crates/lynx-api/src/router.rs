//! Route definitions for the Lynx server.
//!
//! The WebSocket endpoint is the only explicit route; every other request
//! falls through to the static file pipeline.

use axum::{Router, middleware as axum_middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`:
/// both handlers need the peer address.
pub fn build_router(state: AppState) -> Router {
    let ws_path = websocket_path(&state.config.server.websocket_path);

    Router::new()
        .route(&ws_path, get(handlers::ws::ws_upgrade))
        .fallback(handlers::http::serve)
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

fn websocket_path(configured: &str) -> String {
    if configured.starts_with('/') {
        configured.to_string()
    } else {
        format!("/{configured}")
    }
}
