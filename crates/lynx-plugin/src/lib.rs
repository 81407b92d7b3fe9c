//! # lynx-plugin
//!
//! Extension runtime for Lynx. Provides:
//!
//! - Discovery and loading of extension artifacts, built-in or shared-library
//! - Per-extension execution contexts with a shared capability toolkit
//! - An append-only hook registry for the five request/WebSocket hooks
//! - A dispatcher that isolates every callback failure

pub mod api;
pub mod error;
pub mod ffi;
pub mod hooks;
pub mod isolation;
pub mod loader;
pub mod macros;
pub mod manager;
pub mod prelude;
pub mod registry;
pub mod traits;

pub use anyhow;

pub use api::{CapabilityInjector, ExtensionContext, ExtensionIdentity, Toolkit};
pub use error::ExtensionError;
pub use hooks::definitions::{HookKind, Request, Response, WsMessage};
pub use hooks::dispatcher::{DispatchReport, HookDispatcher};
pub use hooks::registry::HookRegistry;
pub use loader::{ArtifactOpener, BuiltinCatalog, DynamicOpener, ExtensionArtifact};
pub use manager::ExtensionManager;
pub use registry::{ExtensionRecord, LoadFailure, LoadSummary};
pub use traits::Extension;
