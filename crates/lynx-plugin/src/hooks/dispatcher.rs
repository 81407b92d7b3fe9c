//! Hook dispatcher: invokes every callback of a chain in order.
//!
//! - Callbacks run synchronously on the calling thread, in chain order.
//! - A failing or panicking callback is logged with its trace and skipped;
//!   later callbacks still run and see whatever the earlier ones changed.
//! - Nothing a callback does can make dispatch itself fail.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use super::definitions::{HookKind, Request, Response, Session, WsMessage};
use super::registry::{HookRegistry, Registered};
use crate::isolation::{Failure, isolate};

/// A single callback failure recorded during dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchFailure {
    /// Extension that registered the callback.
    pub extension: String,
    /// Position of the callback within the chain.
    pub position: usize,
    /// One-line failure description.
    pub message: String,
    /// Error chain or panic backtrace.
    pub trace: Option<String>,
    /// Whether the callback panicked.
    pub panicked: bool,
}

/// Outcome of dispatching one hook event.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    /// The hook kind dispatched.
    pub kind: HookKind,
    /// Number of callbacks invoked.
    pub invoked: usize,
    /// Callbacks that failed, in chain order.
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    fn empty(kind: HookKind) -> Self {
        Self {
            kind,
            invoked: 0,
            failures: Vec::new(),
        }
    }

    /// Whether every callback completed without error.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The arguments of a hook event, borrowed from the transport.
#[derive(Debug)]
pub enum HookEvent<'a> {
    /// `before_request(request)`.
    BeforeRequest(&'a mut Request),
    /// `after_request(request, response)`.
    AfterRequest(&'a mut Request, &'a mut Response),
    /// `websocket_connect(connection, address)`.
    WebsocketConnect(&'a Session),
    /// `websocket_message(connection, address, message)`.
    WebsocketMessage(&'a Session, &'a WsMessage),
    /// `websocket_close(connection, address)`.
    WebsocketClose(&'a Session),
}

impl HookEvent<'_> {
    /// The hook kind this event fires.
    pub fn kind(&self) -> HookKind {
        match self {
            Self::BeforeRequest(_) => HookKind::BeforeRequest,
            Self::AfterRequest(..) => HookKind::AfterRequest,
            Self::WebsocketConnect(_) => HookKind::WebsocketConnect,
            Self::WebsocketMessage(..) => HookKind::WebsocketMessage,
            Self::WebsocketClose(_) => HookKind::WebsocketClose,
        }
    }
}

/// Dispatches hook events to the frozen registry.
#[derive(Debug, Clone)]
pub struct HookDispatcher {
    registry: Arc<HookRegistry>,
}

impl HookDispatcher {
    /// Creates a dispatcher over a frozen registry.
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self { registry }
    }

    /// Returns a reference to the hook registry.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Whether any callback is registered for `kind`.
    pub fn has_callbacks(&self, kind: HookKind) -> bool {
        self.registry.len(kind) > 0
    }

    /// Dispatches `event` to every callback registered for its kind.
    pub fn dispatch(&self, event: HookEvent<'_>) -> DispatchReport {
        match event {
            HookEvent::BeforeRequest(request) => self.before_request(request),
            HookEvent::AfterRequest(request, response) => self.after_request(request, response),
            HookEvent::WebsocketConnect(session) => self.websocket_connect(session),
            HookEvent::WebsocketMessage(session, message) => {
                self.websocket_message(session, message)
            }
            HookEvent::WebsocketClose(session) => self.websocket_close(session),
        }
    }

    /// Fires `before_request`.
    pub fn before_request(&self, request: &mut Request) -> DispatchReport {
        run_chain(
            HookKind::BeforeRequest,
            self.registry.before_request_chain(),
            |callback| callback(&mut *request),
        )
    }

    /// Fires `after_request`.
    pub fn after_request(&self, request: &mut Request, response: &mut Response) -> DispatchReport {
        run_chain(
            HookKind::AfterRequest,
            self.registry.after_request_chain(),
            |callback| callback(&mut *request, &mut *response),
        )
    }

    /// Fires `websocket_connect`.
    pub fn websocket_connect(&self, session: &Session) -> DispatchReport {
        run_chain(
            HookKind::WebsocketConnect,
            self.registry.websocket_connect_chain(),
            |callback| callback(&session.connection, session.addr),
        )
    }

    /// Fires `websocket_message`.
    pub fn websocket_message(&self, session: &Session, message: &WsMessage) -> DispatchReport {
        run_chain(
            HookKind::WebsocketMessage,
            self.registry.websocket_message_chain(),
            |callback| callback(&session.connection, session.addr, message),
        )
    }

    /// Fires `websocket_close`.
    pub fn websocket_close(&self, session: &Session) -> DispatchReport {
        run_chain(
            HookKind::WebsocketClose,
            self.registry.websocket_close_chain(),
            |callback| callback(&session.connection, session.addr),
        )
    }
}

fn run_chain<F: ?Sized>(
    kind: HookKind,
    chain: &[Registered<F>],
    mut invoke: impl FnMut(&F) -> anyhow::Result<()>,
) -> DispatchReport {
    if chain.is_empty() {
        return DispatchReport::empty(kind);
    }

    debug!(hook = %kind, callbacks = chain.len(), "Dispatching hook");

    let mut report = DispatchReport::empty(kind);
    for (position, entry) in chain.iter().enumerate() {
        report.invoked += 1;
        if let Err(failure) = isolate(|| invoke(&*entry.callback)) {
            report
                .failures
                .push(record_failure(kind, position, &entry.extension, failure));
        }
    }
    report
}

fn record_failure(
    kind: HookKind,
    position: usize,
    extension: &str,
    failure: Failure,
) -> DispatchFailure {
    error!(
        hook = %kind,
        extension = %extension,
        position,
        panicked = failure.panicked,
        error = %failure.message,
        trace = failure.trace.as_deref().unwrap_or(""),
        "Hook callback failed"
    );
    DispatchFailure {
        extension: extension.to_string(),
        position,
        message: failure.message,
        trace: failure.trace,
        panicked: failure.panicked,
    }
}
