//! # HTTP API
//!
//! Axum routes in front of the cache service.
//!
//! ## Endpoints
//! - GET /api/users - Users, served cache-aside with provenance
//! - DELETE /api/users/cache - Drop the cached user list
//! - POST /api/cache/cleanup - Sweep expired entries
//! - GET /api/cache/stats - Cache statistics
//! - GET /health - Liveness

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::caching::{CacheResult, CacheService, CacheStats, StoreCapabilities};
use crate::core::error::ServiceResult;
use crate::repository::{User, UserRepository};

/// Cache key holding the full user list
pub const ALL_USERS_KEY: &str = "all_users";

/// Lifetime of the cached user list
pub const ALL_USERS_TTL: Duration = Duration::from_secs(5 * 60);

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheService>,
    pub users: Arc<dyn UserRepository>,
}

impl AppState {
    pub fn new(cache: Arc<CacheService>, users: Arc<dyn UserRepository>) -> Self {
        Self { cache, users }
    }
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub backend: &'static str,
    pub capabilities: StoreCapabilities,
    #[serde(flatten)]
    pub stats: CacheStats,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/users", get(get_users))
        .route("/api/users/cache", delete(clear_users_cache))
        .route("/api/cache/cleanup", post(cleanup_cache))
        .route("/api/cache/stats", get(get_cache_stats))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn get_users(State(state): State<AppState>) -> ServiceResult<Json<CacheResult<Vec<User>>>> {
    let users = Arc::clone(&state.users);
    let result = state
        .cache
        .get_or_set_with_provenance(
            ALL_USERS_KEY,
            || async move { users.get_users().await.map(Some) },
            Some(ALL_USERS_TTL),
        )
        .await?;

    Ok(Json(result))
}

async fn clear_users_cache(State(state): State<AppState>) -> StatusCode {
    state.cache.remove(ALL_USERS_KEY).await;
    info!("Cleared cached user list");
    StatusCode::NO_CONTENT
}

async fn cleanup_cache(State(state): State<AppState>) -> ServiceResult<Json<CleanupResponse>> {
    let deleted = state.cache.cleanup_expired().await?;
    Ok(Json(CleanupResponse { deleted }))
}

async fn get_cache_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let store = state.cache.store();
    Json(StatsResponse {
        backend: store.name(),
        capabilities: store.capabilities(),
        stats: state.cache.stats(),
    })
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "backend": state.cache.store().name(),
        "timestamp": chrono::Utc::now().timestamp(),
    }))
}
