//! ABI of dynamically loaded extensions.
//!
//! A shared-library extension exports one symbol, generated by
//! [`export_extension!`](crate::export_extension). The library must be built
//! with the same compiler and the same `lynx-plugin` version as the server:
//! the entry point uses the Rust ABI and passes Rust types across.

use crate::api::context::ExtensionContext;

/// Name of the registration entry point.
pub const REGISTER_SYMBOL: &str = "lynx_extension_register";

/// Byte form of [`REGISTER_SYMBOL`] for symbol lookup.
pub const REGISTER_SYMBOL_BYTES: &[u8] = b"lynx_extension_register";

/// Signature of the registration entry point.
pub type RegisterFn = unsafe extern "Rust" fn(&mut ExtensionContext) -> anyhow::Result<()>;
