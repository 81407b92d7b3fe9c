//! Catch-all HTTP handler: hook dispatch around static file serving.
//!
//! Request flow:
//! 1. IP allowlist (rejected clients never reach a hook)
//! 2. `before_request`, then the early response if one was slotted
//! 3. static routing under the web root
//! 4. `after_request` on whatever response was produced

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request as HttpRequest, State};
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response as HttpResponse;
use bytes::Bytes;
use tracing::{debug, error, warn};

use lynx_core::error::AppError;
use lynx_plugin::hooks::definitions::ClientHandle;
use lynx_plugin::{Request, Response};

use crate::error::{error_response, status_page};
use crate::files;
use crate::state::AppState;

/// Fallback handler serving every non-WebSocket request.
pub async fn serve(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: HttpRequest,
) -> HttpResponse {
    if !state.is_allowed(peer.ip()) {
        warn!(client = %peer, "Client rejected by IP allowlist");
        return into_http(status_page(403));
    }

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.config.server.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            warn!(client = %peer, error = %e, "Failed to read request body");
            return into_http(status_page(400));
        }
    };

    let request = build_request(&parts, body, peer);
    match tokio::task::spawn_blocking(move || handle(&state, request)).await {
        Ok(response) => into_http(response),
        Err(e) => {
            error!(client = %peer, error = %e, "Request pipeline aborted");
            into_http(status_page(500))
        }
    }
}

/// Runs the hook-wrapped pipeline for one request. Blocking.
pub fn handle(state: &AppState, mut request: Request) -> Response {
    state.dispatcher.before_request(&mut request);

    let mut response = match request.take_early_response() {
        Some(early) => {
            debug!(path = %request.path, status = early.status, "Answered by before_request");
            early
        }
        None => route(state, &request).unwrap_or_else(|e| error_response(&e)),
    };

    state.dispatcher.after_request(&mut request, &mut response);
    response
}

/// Static routing under the web root.
fn route(state: &AppState, request: &Request) -> Result<Response, AppError> {
    let server = &state.config.server;
    let target = files::sanitize(&state.web_root, &request.path)
        .ok_or_else(|| AppError::not_found(format!("rejected path '{}'", request.path)))?;

    if request.path_only() == "/favicon.ico" && !server.favicon.is_empty() {
        if let Some(icon) = files::sanitize(&state.web_root, &server.favicon) {
            if icon.fs_path.is_file() {
                let body = std::fs::read(&icon.fs_path)?;
                return Ok(Response::new(200)
                    .with_header("Content-Type", "image/x-icon")
                    .with_body(body));
            }
        }
    }

    let mut file = target.fs_path;
    if file.is_dir() {
        let index = file.join("index.html");
        if !index.is_file() {
            if !server.browsable_dirs.iter().any(|d| *d == target.rel) {
                return Err(AppError::forbidden(format!(
                    "directory '{}' is not browsable",
                    target.rel
                )));
            }
            let listing = files::directory_listing(&file, &target.rel)?;
            return Ok(Response::html(200, listing));
        }
        file = index;
    }

    if !file.is_file() {
        return Err(AppError::not_found(format!("no file at '{}'", target.rel)));
    }

    match request.method.as_str() {
        "GET" => {
            let body = std::fs::read(&file)?;
            Ok(Response::new(200)
                .with_header("Content-Type", files::guess_mime(&file))
                .with_body(body))
        }
        "POST" => Ok(Response::html(200, files::form_echo(&request.body))),
        other => Err(AppError::validation(format!("method '{other}' not supported"))),
    }
}

/// Builds the hook-facing request from the HTTP parts.
fn build_request(parts: &Parts, body: Bytes, peer: SocketAddr) -> Request {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let mut request = Request::new(
        parts.method.as_str(),
        target,
        format!("{:?}", parts.version),
        ClientHandle::new(peer),
    )
    .with_body(body);

    for (name, value) in &parts.headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        request
            .headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    request
}

/// Converts a hook-facing response into an HTTP response.
///
/// Framing headers are recomputed by the server, so any `Content-Length` or
/// `Transfer-Encoding` set by an extension is dropped.
pub fn into_http(response: Response) -> HttpResponse {
    let status = StatusCode::from_u16(response.status).unwrap_or_else(|_| {
        warn!(status = response.status, "Invalid response status, sending 500");
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut out = HttpResponse::new(Body::from(response.body));
    *out.status_mut() = status;

    for (name, value) in response.headers {
        if name.eq_ignore_ascii_case("content-length")
            || name.eq_ignore_ascii_case("transfer-encoding")
        {
            continue;
        }
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().append(name, value);
            }
            _ => warn!(header = %name, "Dropping invalid response header"),
        }
    }
    out
}
