//! # lynx-cache
//!
//! The shared cache handed to every Lynx extension: a single string-keyed
//! mapping of JSON values, loaded once at startup from a durable file and
//! written back only when an extension asks for it.
//!
//! - Missing or malformed files never fail startup; the store starts empty.
//! - Every read-modify-write and every save runs under one lock per store.
//! - There is no background flush. Unsaved changes are lost on crash.

pub mod error;
pub mod store;

pub use error::CacheError;
pub use store::{CacheMap, CacheStore};
