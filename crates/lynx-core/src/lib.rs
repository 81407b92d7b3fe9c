//! # lynx-core
//!
//! Core crate for the Lynx server. Contains the configuration schemas and
//! the unified error system shared by every other crate.
//!
//! This crate has **no** internal dependencies on other Lynx crates.

pub mod config;
pub mod error;
pub mod result;

pub use config::AppConfig;
pub use error::AppError;
pub use result::AppResult;
