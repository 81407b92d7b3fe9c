//! Errors raised by the extension runtime.

use std::path::PathBuf;

use thiserror::Error;

use lynx_core::error::{AppError, ErrorKind};

/// Errors produced while discovering, opening or serving extensions.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The discovery directory could not be created or listed.
    #[error("cannot scan extension directory '{}': {source}", path.display())]
    Discovery {
        /// Discovery directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No opener knows an extension with this identifier.
    #[error("no extension named '{name}' is available")]
    UnknownExtension {
        /// Extension identifier.
        name: String,
    },

    /// A shared library could not be loaded.
    #[error("failed to load extension library '{}': {message}", path.display())]
    Library {
        /// Artifact path.
        path: PathBuf,
        /// Loader diagnostic.
        message: String,
    },

    /// A shared library does not export the registration entry point.
    #[error("extension library '{}' does not export '{symbol}'", path.display())]
    MissingSymbol {
        /// Artifact path.
        path: PathBuf,
        /// Expected symbol name.
        symbol: String,
    },

    /// The private working directory could not be created.
    #[error("cannot create working directory '{}': {source}", path.display())]
    WorkDir {
        /// Working directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The extension's registration logic failed.
    #[error("extension '{name}' failed to register: {message}")]
    Registration {
        /// Extension identifier.
        name: String,
        /// Failure message.
        message: String,
    },

    /// A string did not name a hook kind.
    #[error("unknown hook kind '{0}'")]
    InvalidHookKind(String),

    /// The WebSocket peer is gone.
    #[error("connection is closed")]
    ConnectionClosed,

    /// The WebSocket outbound queue is full.
    #[error("connection outbound queue is full")]
    OutboundFull,

    /// A capability needs an async runtime and none was bound.
    #[error("no async runtime is available to this extension")]
    NoRuntime,

    /// A regular expression failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Base64 input could not be decoded.
    #[error("invalid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The shared HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl From<ExtensionError> for AppError {
    fn from(err: ExtensionError) -> Self {
        let kind = match &err {
            ExtensionError::InvalidHookKind(_) => ErrorKind::Validation,
            ExtensionError::ConnectionClosed | ExtensionError::OutboundFull => ErrorKind::Dispatch,
            _ => ErrorKind::Extension,
        };
        AppError::with_source(kind, err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_into_app_error_kinds() {
        let err: AppError = ExtensionError::InvalidHookKind("on_boot".into()).into();
        assert_eq!(err.kind, ErrorKind::Validation);

        let err: AppError = ExtensionError::OutboundFull.into();
        assert_eq!(err.kind, ErrorKind::Dispatch);

        let err: AppError = ExtensionError::NoRuntime.into();
        assert_eq!(err.kind, ErrorKind::Extension);
        assert!(std::error::Error::source(&err).is_some());
    }
}
