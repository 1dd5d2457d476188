//! # Cache Aside - Main Entry Point
//!
//! Loads configuration, builds the configured cache backend and serves the HTTP API
//! until ctrl-c.

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use cache_aside::observability::init_logging;
use cache_aside::{
    router, AppConfig, AppState, CacheService, InMemoryUserRepository, ServiceError, ServiceResult,
};

#[tokio::main]
async fn main() -> ServiceResult<()> {
    let config_path =
        std::env::var("CACHE_CONFIG_PATH").unwrap_or_else(|_| "config/cache.yaml".to_string());

    let config = AppConfig::load_or_default(&config_path).await?;
    init_logging(&config.logging);

    info!("Starting cache service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    let cache = Arc::new(CacheService::from_config(&config.cache).await.map_err(|e| {
        error!("Failed to initialize cache backend: {}", e);
        ServiceError::from(e)
    })?);

    let sweeper = config
        .cache
        .cleanup_interval
        .and_then(|every| cache.spawn_cleanup_task(every));

    let state = AppState::new(cache, Arc::new(InMemoryUserRepository::default()));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_address)
        .await
        .map_err(|e| {
            ServiceError::internal(format!(
                "Failed to bind server to {}: {}",
                config.server.bind_address, e
            ))
        })?;
    info!("HTTP server listening on {}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServiceError::internal(format!("Server error: {}", e)))?;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    info!("Cache service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Received Ctrl+C, initiating graceful shutdown");
}
