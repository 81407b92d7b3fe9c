//! Everything an extension crate usually needs.

pub use crate::api::{ExtensionContext, ExtensionIdentity, Toolkit};
pub use crate::hooks::definitions::{
    ClientHandle, Connection, HookKind, Request, Response, Session, WsMessage,
};
pub use crate::traits::Extension;
