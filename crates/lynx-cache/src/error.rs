//! Cache I/O errors.

use std::path::PathBuf;

use thiserror::Error;


/// Errors raised while reading or writing the durable cache file.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache file exists but could not be read.
    #[error("failed to read cache file '{}': {source}", path.display())]
    Read {
        /// Cache file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The cache file does not contain valid JSON.
    #[error("cache file '{}' is not valid JSON: {source}", path.display())]
    Parse {
        /// Cache file path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The cache file holds JSON that is not an object.
    #[error("cache file '{}' does not hold a JSON object", path.display())]
    NotAnObject {
        /// Cache file path.
        path: PathBuf,
    },

    /// The in-memory mapping could not be serialized.
    #[error("failed to serialize cache: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Writing the cache file failed.
    #[error("failed to write cache file '{}': {source}", path.display())]
    Write {
        /// Cache file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The store has no backing file to save to.
    #[error("cache store has no backing file")]
    Detached,
}
