//! Lynx Server: static files and WebSockets wrapped in extension hooks.
//!
//! Main entry point that wires all crates together and starts the server.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use lynx_api::{AppState, build_router};
use lynx_cache::CacheStore;
use lynx_core::config::AppConfig;
use lynx_core::error::AppError;
use lynx_core::result::AppResult;
use lynx_plugin::{BuiltinCatalog, CapabilityInjector, DynamicOpener, ExtensionManager, Toolkit};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment.
///
/// The file is created with defaults on first start.
fn load_configuration() -> AppResult<AppConfig> {
    let config_path =
        std::env::var("LYNX_CONFIG").unwrap_or_else(|_| "config/server.json".to_string());

    AppConfig::write_default_if_missing(Path::new(&config_path))?;
    AppConfig::load(&config_path)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> AppResult<()> {
    tracing::info!("Starting Lynx v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Create directories ───────────────────────────────
    create_directories(&config).await?;

    // ── Step 2: Load the durable cache ───────────────────────────
    let cache = Arc::new(CacheStore::load(&config.cache.file));
    tracing::info!(file = %config.cache.file, keys = cache.len(), "Cache loaded");

    // ── Step 3: Capabilities handed to every extension ───────────
    let toolkit = Toolkit::new(&config.plugins.media_tool_dir)?
        .with_runtime(tokio::runtime::Handle::current());
    let injector = CapabilityInjector::new(cache, Arc::new(toolkit), &config.plugins.root);

    // ── Step 4: Load extensions ──────────────────────────────────
    let catalog = BuiltinCatalog::new()
        .with(plugin_visit_counter::NAME, plugin_visit_counter::register)
        .with_fallback(DynamicOpener::new());
    let mut manager = ExtensionManager::new(injector, catalog);

    if config.plugins.auto_load {
        let summary =
            manager.load_all(Path::new(&config.plugins.directory), &config.plugins.suffix)?;
        tracing::info!(
            loaded = summary.loaded().len(),
            failed = summary.failed().len(),
            "Extensions loaded"
        );
    } else {
        tracing::info!("Extension auto-load disabled");
    }

    // ── Step 5: Build router ─────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, manager.dispatcher());
    let app = build_router(state);

    // ── Step 6: Bind and serve ───────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Lynx server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
    })
    .await
    .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    tracing::info!("Lynx server shut down gracefully");
    Ok(())
}

/// Create the web root and extension directories
async fn create_directories(config: &AppConfig) -> AppResult<()> {
    let dirs = [
        &config.server.web_root,
        &config.plugins.directory,
        &config.plugins.root,
    ];

    for dir in dirs {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AppError::internal(format!("Failed to create dir '{}': {}", dir, e)))?;
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
