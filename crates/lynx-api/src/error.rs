//! Maps domain `AppError` to the plain-text status pages the server sends.

use lynx_core::error::{AppError, ErrorKind};
use lynx_plugin::Response;

/// Canonical reason phrase for the status codes the server produces.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// A `text/plain` page reading e.g. `404 Not Found`.
pub fn status_page(status: u16) -> Response {
    Response::text(status, format!("{status} {}", reason_phrase(status)))
}

/// Status code for an error kind.
pub fn status_for(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::NotFound => 404,
        ErrorKind::Forbidden => 403,
        ErrorKind::Validation => 400,
        _ => 500,
    }
}

/// The status page for `err`. Internal errors are logged.
pub fn error_response(err: &AppError) -> Response {
    let status = status_for(err.kind);
    if status == 500 {
        tracing::error!(kind = %err.kind, error = %err.message, "Internal server error");
    }
    status_page(status)
}
