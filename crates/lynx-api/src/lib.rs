//! # lynx-api
//!
//! HTTP and WebSocket transport for Lynx built on Axum.
//!
//! Serves static files from the web root and wraps every request and
//! WebSocket session in hook dispatch. Dispatch runs on the blocking pool.

pub mod error;
pub mod files;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
