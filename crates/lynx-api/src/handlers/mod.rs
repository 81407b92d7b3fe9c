//! Request handlers.

pub mod http;
pub mod ws;
