//! Hook system: typed hook definitions, registry and dispatcher.

pub mod definitions;
pub mod dispatcher;
pub mod registry;

pub use definitions::{
    ClientHandle, Connection, HookKind, Outbound, Request, Response, Session, WsMessage,
};
pub use dispatcher::{DispatchFailure, DispatchReport, HookDispatcher, HookEvent};
pub use registry::{HookCallback, HookRegistrar, HookRegistry};
