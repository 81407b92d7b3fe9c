//! Hook registry: ordered, append-only callback chains per hook kind.
//!
//! The registry is filled during the single-threaded load phase and then
//! frozen behind an `Arc`; dispatch only ever reads it, so it carries no
//! lock.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::debug;

use super::definitions::{
    AfterRequestFn, BeforeRequestFn, Connection, HookKind, MessageFn, Request, Response,
    SessionFn, WsMessage,
};

/// A callback tagged with the hook kind it belongs to.
#[derive(Clone)]
pub enum HookCallback {
    /// `before_request` callback.
    BeforeRequest(Arc<BeforeRequestFn>),
    /// `after_request` callback.
    AfterRequest(Arc<AfterRequestFn>),
    /// `websocket_connect` callback.
    WebsocketConnect(Arc<SessionFn>),
    /// `websocket_message` callback.
    WebsocketMessage(Arc<MessageFn>),
    /// `websocket_close` callback.
    WebsocketClose(Arc<SessionFn>),
}

impl HookCallback {
    /// The hook kind this callback is registered for.
    pub fn kind(&self) -> HookKind {
        match self {
            Self::BeforeRequest(_) => HookKind::BeforeRequest,
            Self::AfterRequest(_) => HookKind::AfterRequest,
            Self::WebsocketConnect(_) => HookKind::WebsocketConnect,
            Self::WebsocketMessage(_) => HookKind::WebsocketMessage,
            Self::WebsocketClose(_) => HookKind::WebsocketClose,
        }
    }
}

impl std::fmt::Debug for HookCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HookCallback({})", self.kind())
    }
}

/// A callback in a chain, with the extension that registered it.
pub struct Registered<F: ?Sized> {
    /// Extension identifier.
    pub extension: Arc<str>,
    /// The callback.
    pub callback: Arc<F>,
}

impl<F: ?Sized> Clone for Registered<F> {
    fn clone(&self) -> Self {
        Self {
            extension: Arc::clone(&self.extension),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<F: ?Sized> std::fmt::Debug for Registered<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registered")
            .field("extension", &self.extension)
            .finish()
    }
}

/// Registry of hook callbacks organized by hook kind.
///
/// Order within a chain is extension load order, then registration order
/// within the extension.
#[derive(Debug, Default, Clone)]
pub struct HookRegistry {
    before_request: Vec<Registered<BeforeRequestFn>>,
    after_request: Vec<Registered<AfterRequestFn>>,
    websocket_connect: Vec<Registered<SessionFn>>,
    websocket_message: Vec<Registered<MessageFn>>,
    websocket_close: Vec<Registered<SessionFn>>,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `callback` to the end of its kind's chain.
    pub fn append(&mut self, extension: &Arc<str>, callback: HookCallback) {
        let extension = Arc::clone(extension);
        let kind = callback.kind();

        match callback {
            HookCallback::BeforeRequest(callback) => self
                .before_request
                .push(Registered { extension, callback }),
            HookCallback::AfterRequest(callback) => self
                .after_request
                .push(Registered { extension, callback }),
            HookCallback::WebsocketConnect(callback) => self
                .websocket_connect
                .push(Registered { extension, callback }),
            HookCallback::WebsocketMessage(callback) => self
                .websocket_message
                .push(Registered { extension, callback }),
            HookCallback::WebsocketClose(callback) => self
                .websocket_close
                .push(Registered { extension, callback }),
        }

        debug!(hook = %kind, position = self.len(kind) - 1, "Hook callback appended");
    }

    /// Appends everything staged in `registrar`, in staging order, and
    /// returns the kinds that were registered.
    pub fn commit(&mut self, registrar: HookRegistrar) -> Vec<HookKind> {
        let HookRegistrar { extension, staged } = registrar;
        let kinds = staged.iter().map(HookCallback::kind).collect();
        for callback in staged {
            self.append(&extension, callback);
        }
        kinds
    }

    /// Number of callbacks registered for `kind`.
    pub fn len(&self, kind: HookKind) -> usize {
        match kind {
            HookKind::BeforeRequest => self.before_request.len(),
            HookKind::AfterRequest => self.after_request.len(),
            HookKind::WebsocketConnect => self.websocket_connect.len(),
            HookKind::WebsocketMessage => self.websocket_message.len(),
            HookKind::WebsocketClose => self.websocket_close.len(),
        }
    }

    /// Whether no callback is registered for any kind.
    pub fn is_empty(&self) -> bool {
        HookKind::ALL.iter().all(|kind| self.len(*kind) == 0)
    }

    /// Extensions owning each callback of `kind`, in chain order.
    pub fn chain(&self, kind: HookKind) -> Vec<Arc<str>> {
        fn names<F: ?Sized>(chain: &[Registered<F>]) -> Vec<Arc<str>> {
            chain.iter().map(|r| Arc::clone(&r.extension)).collect()
        }
        match kind {
            HookKind::BeforeRequest => names(&self.before_request),
            HookKind::AfterRequest => names(&self.after_request),
            HookKind::WebsocketConnect => names(&self.websocket_connect),
            HookKind::WebsocketMessage => names(&self.websocket_message),
            HookKind::WebsocketClose => names(&self.websocket_close),
        }
    }

    pub(crate) fn before_request_chain(&self) -> &[Registered<BeforeRequestFn>] {
        &self.before_request
    }

    pub(crate) fn after_request_chain(&self) -> &[Registered<AfterRequestFn>] {
        &self.after_request
    }

    pub(crate) fn websocket_connect_chain(&self) -> &[Registered<SessionFn>] {
        &self.websocket_connect
    }

    pub(crate) fn websocket_message_chain(&self) -> &[Registered<MessageFn>] {
        &self.websocket_message
    }

    pub(crate) fn websocket_close_chain(&self) -> &[Registered<SessionFn>] {
        &self.websocket_close
    }
}

/// The append interface handed to one extension during registration.
///
/// Callbacks are staged here and reach the [`HookRegistry`] only if the
/// extension's registration logic completes successfully.
#[derive(Debug)]
pub struct HookRegistrar {
    extension: Arc<str>,
    staged: Vec<HookCallback>,
}

impl HookRegistrar {
    /// Creates an empty registrar for `extension`.
    pub fn new(extension: &str) -> Self {
        Self {
            extension: Arc::from(extension),
            staged: Vec::new(),
        }
    }

    /// The extension this registrar stages callbacks for.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Kinds staged so far, in registration order.
    pub fn staged(&self) -> Vec<HookKind> {
        self.staged.iter().map(HookCallback::kind).collect()
    }

    /// Registers a raw tagged callback.
    pub fn register(&mut self, callback: HookCallback) -> &mut Self {
        self.staged.push(callback);
        self
    }

    /// Registers a `before_request` callback.
    pub fn before_request<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Request) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(HookCallback::BeforeRequest(Arc::new(f)))
    }

    /// Registers an `after_request` callback.
    pub fn after_request<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(HookCallback::AfterRequest(Arc::new(f)))
    }

    /// Registers a `websocket_connect` callback.
    pub fn websocket_connect<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Connection, SocketAddr) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(HookCallback::WebsocketConnect(Arc::new(f)))
    }

    /// Registers a `websocket_message` callback.
    pub fn websocket_message<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Connection, SocketAddr, &WsMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(HookCallback::WebsocketMessage(Arc::new(f)))
    }

    /// Registers a `websocket_close` callback.
    pub fn websocket_close<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Connection, SocketAddr) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(HookCallback::WebsocketClose(Arc::new(f)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_empty() {
        let registry = HookRegistry::new();
        assert!(registry.is_empty());
        for kind in HookKind::ALL {
            assert_eq!(registry.len(kind), 0);
        }
    }

    #[test]
    fn test_commit_preserves_order_across_extensions() {
        let mut registry = HookRegistry::new();

        let mut first = HookRegistrar::new("alpha");
        first
            .before_request(|_| Ok(()))
            .after_request(|_, _| Ok(()))
            .before_request(|_| Ok(()));
        let kinds = registry.commit(first);
        assert_eq!(
            kinds,
            vec![
                HookKind::BeforeRequest,
                HookKind::AfterRequest,
                HookKind::BeforeRequest
            ]
        );

        let mut second = HookRegistrar::new("beta");
        second.before_request(|_| Ok(()));
        registry.commit(second);

        let owners: Vec<String> = registry
            .chain(HookKind::BeforeRequest)
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(owners, vec!["alpha", "alpha", "beta"]);
        assert_eq!(registry.len(HookKind::AfterRequest), 1);
        assert_eq!(registry.len(HookKind::WebsocketMessage), 0);
    }

    #[test]
    fn test_uncommitted_registrar_leaves_registry_untouched() {
        let registry = HookRegistry::new();
        let mut staged = HookRegistrar::new("ghost");
        staged.websocket_connect(|_, _| Ok(()));
        assert_eq!(staged.staged(), vec![HookKind::WebsocketConnect]);
        drop(staged);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_callback_kind_tags() {
        let mut registrar = HookRegistrar::new("tags");
        registrar
            .websocket_connect(|_, _| Ok(()))
            .websocket_message(|_, _, _| Ok(()))
            .websocket_close(|_, _| Ok(()));
        assert_eq!(
            registrar.staged(),
            vec![
                HookKind::WebsocketConnect,
                HookKind::WebsocketMessage,
                HookKind::WebsocketClose
            ]
        );
    }
}
