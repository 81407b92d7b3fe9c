//! HTTP/WebSocket server configuration.

use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory static files are served from.
    #[serde(default = "default_web_root")]
    pub web_root: String,
    /// Whether only allowlisted client IPs may connect.
    #[serde(default)]
    pub ip_whitelist_enabled: bool,
    /// Client IPs accepted when the allowlist is enabled.
    #[serde(default = "default_ip_whitelist")]
    pub ip_whitelist: Vec<String>,
    /// Web-root relative directories that may be listed when they have no
    /// `index.html`.
    #[serde(default = "default_browsable_dirs")]
    pub browsable_dirs: Vec<String>,
    /// Web-root relative path served for `/favicon.ico`. Empty disables it.
    #[serde(default = "default_favicon")]
    pub favicon: String,
    /// Path of the WebSocket endpoint.
    #[serde(default = "default_websocket_path")]
    pub websocket_path: String,
    /// Maximum accepted request body in bytes.
    #[serde(default = "default_max_body")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            web_root: default_web_root(),
            ip_whitelist_enabled: false,
            ip_whitelist: default_ip_whitelist(),
            browsable_dirs: default_browsable_dirs(),
            favicon: default_favicon(),
            websocket_path: default_websocket_path(),
            max_body_bytes: default_max_body(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_web_root() -> String {
    "root".to_string()
}

fn default_ip_whitelist() -> Vec<String> {
    vec!["127.0.0.1".to_string()]
}

fn default_browsable_dirs() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_favicon() -> String {
    "/favicon.ico".to_string()
}

fn default_websocket_path() -> String {
    "/ws".to_string()
}

fn default_max_body() -> usize {
    8 * 1024 * 1024
}
