//! Application state shared across all handlers.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use lynx_core::config::AppConfig;
use lynx_plugin::HookDispatcher;

/// State passed to every Axum handler via `State<AppState>`.
///
/// All fields are cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Dispatcher over the frozen hook registry
    pub dispatcher: HookDispatcher,
    /// Directory static files are served from
    pub web_root: Arc<PathBuf>,
}

impl AppState {
    /// Builds the state. The web root comes from `server.web_root`.
    pub fn new(config: AppConfig, dispatcher: HookDispatcher) -> Self {
        let web_root = PathBuf::from(&config.server.web_root);
        Self {
            config: Arc::new(config),
            dispatcher,
            web_root: Arc::new(web_root),
        }
    }

    /// Whether a client at `ip` may be served.
    pub fn is_allowed(&self, ip: IpAddr) -> bool {
        let server = &self.config.server;
        if !server.ip_whitelist_enabled {
            return true;
        }
        let ip = ip.to_canonical();
        server.ip_whitelist.iter().any(|allowed| {
            allowed.parse::<IpAddr>().is_ok_and(|a| a == ip) || *allowed == ip.to_string()
        })
    }
}
