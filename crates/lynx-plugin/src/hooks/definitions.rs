//! Hook kinds and the objects handed to hook callbacks.
//!
//! These shapes are the stable contract between the server and extensions:
//! adding a field is fine, changing a callback signature is a breaking
//! change for every compiled extension.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::error::ExtensionError;

/// The five lifecycle events an extension can hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// Fired after the request is parsed, before routing. May mutate the request.
    BeforeRequest,
    /// Fired once a response exists, before it is written. May mutate the response.
    AfterRequest,
    /// Fired when a WebSocket session is established.
    WebsocketConnect,
    /// Fired for every inbound WebSocket message.
    WebsocketMessage,
    /// Fired when a WebSocket session ends.
    WebsocketClose,
}

impl HookKind {
    /// Every hook kind, in lifecycle order.
    pub const ALL: [HookKind; 5] = [
        Self::BeforeRequest,
        Self::AfterRequest,
        Self::WebsocketConnect,
        Self::WebsocketMessage,
        Self::WebsocketClose,
    ];

    /// Returns the string name of this hook kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeRequest => "before_request",
            Self::AfterRequest => "after_request",
            Self::WebsocketConnect => "websocket_connect",
            Self::WebsocketMessage => "websocket_message",
            Self::WebsocketClose => "websocket_close",
        }
    }
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookKind {
    type Err = ExtensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ExtensionError::InvalidHookKind(s.to_string()))
    }
}

/// Opaque handle identifying the client connection a request arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHandle {
    id: Uuid,
    addr: SocketAddr,
}

impl ClientHandle {
    /// Creates a handle for a client at `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            addr,
        }
    }

    /// Unique id of this connection.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remote address of the client.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// An HTTP request as seen by `before_request` / `after_request`.
///
/// Header names are stored lower-case; every lookup is case-insensitive.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method, e.g. `GET`.
    pub method: String,
    /// Raw request target, including any query string.
    pub path: String,
    /// Protocol version, e.g. `HTTP/1.1`.
    pub version: String,
    /// Header mapping with lower-case names.
    pub headers: HashMap<String, String>,
    /// Raw body.
    pub body: Bytes,
    /// Client connection handle.
    pub client: ClientHandle,
    /// Response a `before_request` callback asked to answer with.
    early_response: Option<Response>,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        version: impl Into<String>,
        client: ClientHandle,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            version: version.into(),
            headers: HashMap::new(),
            body: Bytes::new(),
            client,
            early_response: None,
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Looks up a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Sets a header, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Removes a header.
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(&name.to_ascii_lowercase())
    }

    /// The path with any query string removed.
    pub fn path_only(&self) -> &str {
        self.path.split_once('?').map_or(self.path.as_str(), |(p, _)| p)
    }

    /// The query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.path.split_once('?').map(|(_, q)| q)
    }

    /// Answers the request with `response` instead of routing it.
    ///
    /// The remaining `before_request` callbacks still run and may replace or
    /// clear the slot. The response then goes through `after_request`.
    pub fn respond(&mut self, response: Response) {
        self.early_response = Some(response);
    }

    /// The slotted early response.
    pub fn early_response(&self) -> Option<&Response> {
        self.early_response.as_ref()
    }

    /// Clears the early response slot.
    pub fn clear_early_response(&mut self) {
        self.early_response = None;
    }

    /// Takes the early response out of the slot.
    pub fn take_early_response(&mut self) -> Option<Response> {
        self.early_response.take()
    }
}

/// An HTTP response as seen by `after_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code.
    pub status: u16,
    /// Header mapping. Names keep the case they were set with.
    pub headers: HashMap<String, String>,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl Response {
    /// Creates an empty response with `status`.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// A `text/plain` response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(body.into().into_bytes())
    }

    /// A `text/html` response.
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("Content-Type", "text/html")
            .with_body(body.into().into_bytes())
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing any value stored under a differently-cased
    /// name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }

    /// Removes a header, ignoring case.
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        let key = self
            .headers
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned()?;
        self.headers.remove(&key)
    }
}

/// A WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
    /// Close the session.
    Close,
}

impl WsMessage {
    /// The text payload, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Handle to a WebSocket connection. Replies are queued to the transport
/// through a bounded channel so sending never blocks a callback.
///
/// Closing is signalled out of band, so a full queue cannot swallow it.
#[derive(Debug, Clone)]
pub struct Connection {
    id: Uuid,
    outbound: mpsc::Sender<WsMessage>,
    closing: Arc<watch::Sender<bool>>,
    open: Arc<AtomicBool>,
}

impl Connection {
    /// Creates a connection handle and the receiver the transport drains.
    pub fn new(capacity: usize) -> (Self, Outbound) {
        let (outbound, messages) = mpsc::channel(capacity);
        let (closing, close_rx) = watch::channel(false);
        let conn = Self {
            id: Uuid::new_v4(),
            outbound,
            closing: Arc::new(closing),
            open: Arc::new(AtomicBool::new(true)),
        };
        let rx = Outbound {
            messages,
            closing: close_rx,
            close_sent: false,
        };
        (conn, rx)
    }

    /// Unique id of this connection.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the connection still accepts messages.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    /// Queues a message for the peer.
    pub fn send(&self, message: WsMessage) -> Result<(), ExtensionError> {
        if !self.is_open() {
            return Err(ExtensionError::ConnectionClosed);
        }
        self.outbound.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ExtensionError::OutboundFull,
            mpsc::error::TrySendError::Closed(_) => ExtensionError::ConnectionClosed,
        })
    }

    /// Queues a text frame.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), ExtensionError> {
        self.send(WsMessage::Text(text.into()))
    }

    /// Queues a binary frame.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<(), ExtensionError> {
        self.send(WsMessage::Binary(data.into()))
    }

    /// Asks the transport to close the session once the frames already
    /// queued are sent. Later sends fail.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.closing.send_replace(true);
        }
    }

    /// Marks the connection closed without notifying the peer. Called by the
    /// transport once the socket is gone.
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }
}

/// Transport side of a [`Connection`]: queued frames, then a single
/// [`WsMessage::Close`] once the connection was closed.
#[derive(Debug)]
pub struct Outbound {
    messages: mpsc::Receiver<WsMessage>,
    closing: watch::Receiver<bool>,
    close_sent: bool,
}

impl Outbound {
    /// Next frame to write, or `None` once the session is done.
    pub async fn recv(&mut self) -> Option<WsMessage> {
        loop {
            if let Some(message) = self.try_recv() {
                return Some(message);
            }
            if self.close_sent {
                return None;
            }

            let signal_dropped = tokio::select! {
                message = self.messages.recv() => return message,
                changed = self.closing.changed() => changed.is_err(),
            };
            if signal_dropped {
                return self.messages.recv().await;
            }
        }
    }

    /// Next frame if one is ready now.
    pub fn try_recv(&mut self) -> Option<WsMessage> {
        if let Ok(message) = self.messages.try_recv() {
            return Some(message);
        }
        if !self.close_sent && *self.closing.borrow_and_update() {
            self.close_sent = true;
            return Some(WsMessage::Close);
        }
        None
    }
}

/// A WebSocket session: the connection plus the peer address.
#[derive(Debug, Clone)]
pub struct Session {
    /// Connection handle.
    pub connection: Connection,
    /// Remote address.
    pub addr: SocketAddr,
}

impl Session {
    /// Creates a session.
    pub fn new(connection: Connection, addr: SocketAddr) -> Self {
        Self { connection, addr }
    }
}

/// `before_request(request)`.
pub type BeforeRequestFn = dyn Fn(&mut Request) -> anyhow::Result<()> + Send + Sync;

/// `after_request(request, response)`.
pub type AfterRequestFn = dyn Fn(&mut Request, &mut Response) -> anyhow::Result<()> + Send + Sync;

/// `websocket_connect(connection, address)` and `websocket_close(connection, address)`.
pub type SessionFn = dyn Fn(&Connection, SocketAddr) -> anyhow::Result<()> + Send + Sync;

/// `websocket_message(connection, address, message)`.
pub type MessageFn =
    dyn Fn(&Connection, SocketAddr, &WsMessage) -> anyhow::Result<()> + Send + Sync;

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ClientHandle {
        ClientHandle::new("127.0.0.1:5000".parse().unwrap())
    }

    #[test]
    fn test_hook_kind_names_round_trip() {
        for kind in HookKind::ALL {
            assert_eq!(kind.as_str().parse::<HookKind>().unwrap(), kind);
        }
        assert!("on_upload".parse::<HookKind>().is_err());
    }

    #[test]
    fn test_hook_kind_serde_uses_snake_case() {
        let json = serde_json::to_string(&HookKind::WebsocketMessage).unwrap();
        assert_eq!(json, "\"websocket_message\"");
    }

    #[test]
    fn test_request_headers_are_case_insensitive() {
        let mut req = Request::new("GET", "/a?b=1", "HTTP/1.1", client()).with_header("X-A", "1");
        assert_eq!(req.header("x-a"), Some("1"));
        assert_eq!(req.headers.get("x-a").map(String::as_str), Some("1"));

        req.set_header("x-A", "2");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.remove_header("X-A").as_deref(), Some("2"));
    }

    #[test]
    fn test_request_path_and_query() {
        let req = Request::new("GET", "/search?q=lynx", "HTTP/1.1", client());
        assert_eq!(req.path_only(), "/search");
        assert_eq!(req.query(), Some("q=lynx"));

        let bare = Request::new("GET", "/", "HTTP/1.1", client());
        assert_eq!(bare.query(), None);
    }

    #[test]
    fn test_early_response_slot() {
        let mut req = Request::new("GET", "/", "HTTP/1.1", client());
        assert!(req.early_response().is_none());

        req.respond(Response::text(401, "no"));
        assert_eq!(req.early_response().map(|r| r.status), Some(401));

        let taken = req.take_early_response().unwrap();
        assert_eq!(taken.body, b"no");
        assert!(req.early_response().is_none());
    }

    #[test]
    fn test_response_header_replacement_ignores_case() {
        let mut resp = Response::new(200).with_header("Content-Type", "text/html");
        resp.set_header("content-type", "text/plain");

        assert_eq!(resp.headers.len(), 1);
        assert_eq!(resp.header("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(resp.remove_header("Content-Type").as_deref(), Some("text/plain"));
        assert!(resp.headers.is_empty());
    }

    #[test]
    fn test_connection_send_and_close() {
        let (conn, mut rx) = Connection::new(4);
        conn.send_text("hello").unwrap();
        conn.close();

        assert_eq!(rx.try_recv().unwrap(), WsMessage::Text("hello".into()));
        assert_eq!(rx.try_recv().unwrap(), WsMessage::Close);
        assert!(matches!(
            conn.send_text("late"),
            Err(ExtensionError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_connection_full_queue() {
        let (conn, _rx) = Connection::new(1);
        conn.send_binary(vec![1]).unwrap();
        assert!(matches!(
            conn.send_binary(vec![2]),
            Err(ExtensionError::OutboundFull)
        ));
    }

    #[test]
    fn test_connection_close_with_full_queue() {
        let (conn, mut rx) = Connection::new(1);
        conn.send_text("fill").unwrap();
        conn.close();

        assert!(!conn.is_open());
        assert_eq!(rx.try_recv(), Some(WsMessage::Text("fill".into())));
        assert_eq!(rx.try_recv(), Some(WsMessage::Close));
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn test_outbound_recv_wakes_on_close() {
        let (conn, mut rx) = Connection::new(1);
        let closer = conn.clone();
        let waiter = tokio::spawn(async move {
            let first = rx.recv().await;
            let second = rx.recv().await;
            (first, second)
        });

        tokio::task::yield_now().await;
        closer.close();

        let (first, second) = waiter.await.unwrap();
        assert_eq!(first, Some(WsMessage::Close));
        assert_eq!(second, None);
        drop(conn);
    }

    #[test]
    fn test_connection_dropped_receiver() {
        let (conn, rx) = Connection::new(1);
        drop(rx);
        assert!(!conn.is_open());
        assert!(matches!(
            conn.send_text("x"),
            Err(ExtensionError::ConnectionClosed)
        ));
    }
}
