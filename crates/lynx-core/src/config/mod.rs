//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! an optional file plus `LYNX__`-prefixed environment variables. Each
//! sub-module represents a logical configuration section; every field has
//! a serde default so an empty source yields a runnable server.

pub mod app;
pub mod cache;
pub mod logging;
pub mod plugin;

use std::path::Path;

use serde::{Deserialize, Serialize};

use self::app::ServerConfig;
use self::cache::CacheConfig;
use self::logging::LoggingConfig;
use self::plugin::PluginConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP/WebSocket server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Extension discovery and capability settings.
    #[serde(default)]
    pub plugins: PluginConfig,
    /// Durable cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from `path` (any format the `config` crate
    /// recognises by extension) layered under `LYNX__` environment variables.
    ///
    /// A missing file is not an error; defaults fill every gap.
    pub fn load(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("LYNX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Write the default configuration as pretty JSON to `path`, creating
    /// parent directories. Existing files are left untouched.
    pub fn write_default_if_missing(path: &Path) -> Result<bool, AppError> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&Self::default())?;
        std::fs::write(path, body)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let config = AppConfig::load(path.to_str().unwrap()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.plugins.suffix, "wsp");
        assert_eq!(config.cache.file, "cache.dat");
        assert!(!config.server.ip_whitelist_enabled);
    }

    #[test]
    fn test_partial_json_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        std::fs::write(
            &path,
            r#"{ "server": { "port": 9090, "browsable_dirs": ["/", "/pub"] } }"#,
        )
        .unwrap();

        let config = AppConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.browsable_dirs, vec!["/", "/pub"]);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.plugins.directory, "plugins/wsp");
    }

    #[test]
    fn test_write_default_if_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("server.json");

        assert!(AppConfig::write_default_if_missing(&path).unwrap());
        assert!(!AppConfig::write_default_if_missing(&path).unwrap());

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["server"]["favicon"], "/favicon.ico");
    }
}
