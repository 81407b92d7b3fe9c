//! WebSocket upgrade handler.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{error, info, warn};

use lynx_plugin::hooks::definitions::{Connection, Session};
use lynx_plugin::{DispatchReport, HookDispatcher, HookKind, WsMessage};

use super::http::into_http;
use crate::error::status_page;
use crate::state::AppState;

/// Outbound frames an extension may queue before sends start failing.
const OUTBOUND_CAPACITY: usize = 64;

/// GET {websocket_path}: WebSocket upgrade
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    if !state.is_allowed(peer.ip()) {
        warn!(client = %peer, "WebSocket client rejected by IP allowlist");
        return into_http(status_page(403));
    }

    ws.on_upgrade(move |socket| handle_ws_connection(state, peer, socket))
}

/// Handles an established WebSocket connection.
async fn handle_ws_connection(state: AppState, peer: SocketAddr, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (connection, mut outbound_rx) = Connection::new(OUTBOUND_CAPACITY);
    let session = Arc::new(Session::new(connection, peer));
    let conn_id = session.connection.id();

    info!(conn_id = %conn_id, client = %peer, "WebSocket connection established");

    // Spawn outbound message forwarder
    let outbound_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let (frame, last) = match msg {
                WsMessage::Text(text) => (Message::Text(text.into()), false),
                WsMessage::Binary(data) => (Message::Binary(data.into()), false),
                WsMessage::Close => (Message::Close(None), true),
            };
            if ws_tx.send(frame).await.is_err() || last {
                break;
            }
        }
    });

    let s = Arc::clone(&session);
    dispatch(&state, HookKind::WebsocketConnect, move |d| d.websocket_connect(&s)).await;

    // Process inbound messages
    while let Some(result) = ws_rx.next().await {
        let message = match result {
            Ok(Message::Text(text)) => WsMessage::Text(text.as_str().to_owned()),
            Ok(Message::Binary(data)) => WsMessage::Binary(data.to_vec()),
            Ok(Message::Close(_)) => break,
            // Ping/pong is answered by axum
            Ok(_) => continue,
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        };
        let s = Arc::clone(&session);
        dispatch(&state, HookKind::WebsocketMessage, move |d| {
            d.websocket_message(&s, &message)
        })
        .await;
    }

    // Cleanup
    session.connection.mark_closed();
    let s = Arc::clone(&session);
    dispatch(&state, HookKind::WebsocketClose, move |d| d.websocket_close(&s)).await;
    outbound_task.abort();

    info!(conn_id = %conn_id, client = %peer, "WebSocket connection closed");
}

/// Runs one WebSocket hook on the blocking pool and waits for the chain.
async fn dispatch<F>(state: &AppState, kind: HookKind, fire: F)
where
    F: FnOnce(&HookDispatcher) -> DispatchReport + Send + 'static,
{
    if !state.dispatcher.has_callbacks(kind) {
        return;
    }

    let dispatcher = state.dispatcher.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || fire(&dispatcher)).await {
        error!(hook = %kind, error = %e, "WebSocket dispatch aborted");
    }
}
