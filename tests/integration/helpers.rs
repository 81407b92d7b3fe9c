//! Shared test helpers for integration tests.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use tower::ServiceExt;

use lynx_api::{AppState, build_router};
use lynx_cache::CacheStore;
use lynx_core::config::AppConfig;
use lynx_plugin::{BuiltinCatalog, CapabilityInjector, DynamicOpener, ExtensionManager, Toolkit};

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Manager that loaded the extensions
    pub manager: ExtensionManager,
    /// Backing file of the durable cache
    pub cache_file: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestApp {
    /// Builds a server over a temporary tree, enabling the given artifacts.
    pub fn new(artifacts: &[&str]) -> Self {
        Self::with_cache_file(artifacts, None)
    }

    /// Like [`TestApp::new`], with `cache.dat` written beforehand.
    pub fn with_cache_file(artifacts: &[&str], cache_contents: Option<&[u8]>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let mut config = AppConfig::default();
        config.server.web_root = path_string(&root.join("www"));
        config.plugins.directory = path_string(&root.join("plugins").join("wsp"));
        config.plugins.root = path_string(&root.join("plugins"));
        config.cache.file = path_string(&root.join("cache.dat"));

        std::fs::create_dir_all(&config.server.web_root).unwrap();
        std::fs::write(root.join("www").join("index.html"), "<h1>lynx</h1>").unwrap();
        std::fs::create_dir_all(&config.plugins.directory).unwrap();
        for artifact in artifacts {
            std::fs::write(Path::new(&config.plugins.directory).join(artifact), b"").unwrap();
        }

        let cache_file = PathBuf::from(&config.cache.file);
        if let Some(contents) = cache_contents {
            std::fs::write(&cache_file, contents).unwrap();
        }
        let cache = Arc::new(CacheStore::load(&cache_file));
        let toolkit = Arc::new(Toolkit::new(&config.plugins.media_tool_dir).unwrap());
        let injector = CapabilityInjector::new(cache, toolkit, &config.plugins.root);

        let catalog = BuiltinCatalog::new()
            .with(plugin_visit_counter::NAME, plugin_visit_counter::register)
            .with_fallback(DynamicOpener::new());
        let mut manager = ExtensionManager::new(injector, catalog);
        manager
            .load_all(Path::new(&config.plugins.directory), &config.plugins.suffix)
            .unwrap();

        let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        let state = AppState::new(config, manager.dispatcher());
        let router = build_router(state).layer(MockConnectInfo(peer));

        Self {
            router,
            manager,
            cache_file,
            _dir: dir,
        }
    }

    /// Sends a GET request and returns status, headers and body.
    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8_lossy(&body).into_owned())
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
