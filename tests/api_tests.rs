//! # HTTP API Integration Tests
//!
//! Drives the router with `axum-test` over a file-backed cache.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use cache_aside::caching::{
    CacheService, CacheStore, EntryOptions, FileCacheStore, FileCacheStoreConfig,
    StoreCapabilities,
};
use cache_aside::{router, AppState, InMemoryUserRepository};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;

struct TestApp {
    server: TestServer,
    users: Arc<InMemoryUserRepository>,
    _temp: TempDir,
}

fn file_backed_app() -> TestApp {
    let temp = tempfile::tempdir().unwrap();
    let store = FileCacheStore::new(FileCacheStoreConfig {
        directory: temp.path().join("cache"),
        default_ttl: Duration::from_secs(600),
        ..Default::default()
    });
    let cache = Arc::new(CacheService::new(Arc::new(store), Duration::from_secs(600)));
    let users = Arc::new(InMemoryUserRepository::default());

    let app = router(AppState::new(cache, users.clone()));
    TestApp {
        server: TestServer::new(app).unwrap(),
        users,
        _temp: temp,
    }
}

/// Store without a sweep, standing in for a remote backend
#[derive(Default)]
struct MapStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl CacheStore for MapStore {
    fn name(&self) -> &'static str {
        "map"
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::default()
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &[u8], _options: &EntryOptions) {
        self.entries.lock().await.insert(key.to_string(), value.to_vec());
    }

    async fn remove(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    async fn refresh(&self, _key: &str) {}
}

#[tokio::test]
async fn test_get_users_reports_origin_then_cache() {
    let app = file_backed_app();

    let response = app.server.get("/api/users").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["source"], "origin");
    assert_eq!(body["isFromCache"], false);
    assert_eq!(
        body["data"],
        json!([{"id": 1, "name": "User1"}, {"id": 2, "name": "User2"}])
    );

    let response = app.server.get("/api/users").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["source"], "cache");
    assert_eq!(body["isFromCache"], true);

    assert_eq!(app.users.load_count(), 1);
}

#[tokio::test]
async fn test_clearing_user_cache_forces_origin_load() {
    let app = file_backed_app();

    app.server.get("/api/users").await.assert_status_ok();

    let response = app.server.delete("/api/users/cache").await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let body: Value = app.server.get("/api/users").await.json();
    assert_eq!(body["source"], "origin");
    assert_eq!(app.users.load_count(), 2);
}

#[tokio::test]
async fn test_cleanup_on_file_backend() {
    let app = file_backed_app();
    app.server.get("/api/users").await.assert_status_ok();

    let response = app.server.post("/api/cache/cleanup").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["deleted"], 0);
}

#[tokio::test]
async fn test_cleanup_without_capability_is_bad_request() {
    let cache = Arc::new(CacheService::new(
        Arc::new(MapStore::default()),
        Duration::from_secs(600),
    ));
    let app = router(AppState::new(cache, Arc::new(InMemoryUserRepository::default())));
    let server = TestServer::new(app).unwrap();

    let response = server.post("/api/cache/cleanup").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "invalid_operation");
    assert_eq!(body["error"]["code"], 400);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let app = file_backed_app();
    app.server.get("/api/users").await.assert_status_ok();
    app.server.get("/api/users").await.assert_status_ok();

    let body: Value = app.server.get("/api/cache/stats").await.json();
    assert_eq!(body["backend"], "file");
    assert_eq!(body["capabilities"]["cleanup"], true);
    assert_eq!(body["hits"], 1);
    assert_eq!(body["misses"], 1);
    assert_eq!(body["origin_loads"], 1);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = file_backed_app();

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "file");
}
