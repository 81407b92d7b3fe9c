//! Durable cache configuration.

use serde::{Deserialize, Serialize};

/// Durable cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// File the cache mapping is loaded from and saved to.
    #[serde(default = "default_file")]
    pub file: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file: default_file(),
        }
    }
}

fn default_file() -> String {
    "cache.dat".to_string()
}
