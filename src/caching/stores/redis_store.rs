//! # Redis Cache Store
//!
//! This module provides a Redis-based cache implementation with reconnect-and-retry
//! handling.
//!
//! Each key is stored as one JSON record holding the payload, its timestamps and
//! the sliding window. Redis gets its own expiration on the record (the sliding
//! window, capped by the absolute expiry) so stale records are reclaimed even when
//! nothing reads them; reads re-arm that window. The absolute `expiresAt` in the
//! record is still checked on every read.

use super::{CacheStore, StoreCapabilities};
use crate::caching::entry::{EntryOptions, Payload};
use crate::caching::key_generator::StorageKey;
use crate::caching::{CacheError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Redis cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisCacheStoreConfig {
    /// Redis connection URL
    pub url: String,

    /// Key prefix for all cache entries
    pub key_prefix: String,

    /// TTL applied when a write carries no expiration
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Maximum number of connection retries
    pub max_retries: u32,

    /// Retry delay
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for RedisCacheStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "dbo:AppCache:".to_string(),
            default_ttl: Duration::from_secs(10 * 60),
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Record layout stored in Redis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub data: Payload,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sliding_seconds: Option<u64>,
}

impl RemoteRecord {
    /// Build the record for a write at `now`, `None` if it would be born expired.
    ///
    /// Without an explicit sliding window the record slides over half its lifetime.
    pub fn new(value: &[u8], options: &EntryOptions, default_ttl: Duration, now: DateTime<Utc>) -> Option<Self> {
        let expires_at = options.resolve_expiry(now, default_ttl);
        let lifetime = (expires_at - now).to_std().ok().filter(|d| !d.is_zero())?;

        let sliding = options.sliding_expiration.unwrap_or(lifetime / 2);
        let sliding_seconds = Some(sliding.as_secs()).filter(|secs| *secs > 0);

        Some(Self {
            data: Payload::from(value),
            created_at: now,
            expires_at,
            sliding_seconds,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Store-native expiration to put on the key at `now`: the sliding window
    /// capped by the time left before the absolute expiry.
    pub fn native_expiry(&self, now: DateTime<Utc>) -> Option<Duration> {
        let remaining = (self.expires_at - now).to_std().ok().filter(|d| !d.is_zero())?;

        let window = match self.sliding_seconds {
            Some(secs) => remaining.min(Duration::from_secs(secs)),
            None => remaining,
        };

        Some(window.max(Duration::from_millis(1)))
    }
}

/// Redis cache implementation
pub struct RedisCacheStore {
    /// Configuration
    config: RedisCacheStoreConfig,

    /// Redis connection manager, replaced on reconnect
    connection_manager: RwLock<ConnectionManager>,
}

impl RedisCacheStore {
    /// Connect a new Redis cache
    pub async fn connect(config: RedisCacheStoreConfig) -> StoreResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let connection_manager = ConnectionManager::new(client).await?;

        info!("Redis cache connected to {}", config.url);

        Ok(Self {
            config,
            connection_manager: RwLock::new(connection_manager),
        })
    }

    /// Get the full cache key with prefix
    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, StorageKey::encode(key))
    }

    /// Execute a Redis operation with retry logic
    async fn execute_with_retry<F, T>(&self, operation: F) -> StoreResult<T>
    where
        F: Fn(&mut ConnectionManager) -> std::pin::Pin<Box<dyn std::future::Future<Output = RedisResult<T>> + Send + '_>>
            + Send
            + Sync,
        T: Send,
    {
        let mut retries = 0;

        loop {
            // ConnectionManager multiplexes over one connection; a clone shares it.
            let mut conn = self.connection_manager.read().await.clone();

            match operation(&mut conn).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!("Redis operation failed: {}", e);

                    if retries >= self.config.max_retries {
                        return Err(CacheError::Redis(e));
                    }

                    retries += 1;

                    tokio::time::sleep(self.config.retry_delay * retries).await;

                    if let Err(reconnect_err) = self.reconnect().await {
                        warn!("Failed to reconnect to Redis: {}", reconnect_err);
                    }
                }
            }
        }
    }

    /// Reconnect to Redis
    async fn reconnect(&self) -> StoreResult<()> {
        let client = Client::open(self.config.url.as_str())?;
        let new_connection_manager = ConnectionManager::new(client).await?;

        let mut conn = self.connection_manager.write().await;
        *conn = new_connection_manager;

        info!("Reconnected to Redis");
        Ok(())
    }

    async fn fetch_record(&self, full_key: &str) -> StoreResult<Option<RemoteRecord>> {
        let raw: Option<Vec<u8>> = self
            .execute_with_retry(|conn| {
                let full_key = full_key.to_string();
                Box::pin(async move { conn.get(&full_key).await })
            })
            .await?;

        match raw {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn delete_key(&self, full_key: &str) -> StoreResult<bool> {
        let deleted: i64 = self
            .execute_with_retry(|conn| {
                let full_key = full_key.to_string();
                Box::pin(async move { conn.del(&full_key).await })
            })
            .await?;

        Ok(deleted > 0)
    }

    async fn expire_key(&self, full_key: &str, window: Duration) -> StoreResult<()> {
        let millis = window.as_millis() as u64;
        self.execute_with_retry(|conn| {
            let full_key = full_key.to_string();
            Box::pin(async move {
                redis::cmd("PEXPIRE")
                    .arg(&full_key)
                    .arg(millis)
                    .query_async::<_, i64>(conn)
                    .await
            })
        })
        .await?;

        Ok(())
    }

    async fn get_record(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let full_key = self.full_key(key);

        let Some(record) = self.fetch_record(&full_key).await? else {
            debug!("Redis cache miss for key: {}", key);
            return Ok(None);
        };

        let now = Utc::now();
        if record.is_expired_at(now) {
            info!("Redis cache expired for key: {}", key);
            self.delete_key(&full_key).await?;
            return Ok(None);
        }

        if record.sliding_seconds.is_some() {
            if let Some(window) = record.native_expiry(now) {
                self.expire_key(&full_key, window).await?;
            }
        }

        debug!("Redis cache hit for key: {}", key);
        Ok(Some(record.data.into_bytes()))
    }

    async fn set_record(&self, key: &str, value: &[u8], options: &EntryOptions) -> StoreResult<()> {
        let full_key = self.full_key(key);
        let now = Utc::now();

        let Some((record, window)) = RemoteRecord::new(value, options, self.config.default_ttl, now)
            .and_then(|record| record.native_expiry(now).map(|window| (record, window)))
        else {
            warn!("Redis cache entry for key: {} would be born expired, not stored", key);
            self.delete_key(&full_key).await?;
            return Ok(());
        };

        let bytes = serde_json::to_vec(&record)?;
        let millis = window.as_millis() as u64;

        self.execute_with_retry(|conn| {
            let full_key = full_key.clone();
            let bytes = bytes.clone();
            Box::pin(async move {
                redis::cmd("SET")
                    .arg(&full_key)
                    .arg(bytes)
                    .arg("PX")
                    .arg(millis)
                    .query_async::<_, ()>(conn)
                    .await
            })
        })
        .await?;

        info!(
            "Redis cache set for key: {}, expires at: {}, store expiry: {:?}",
            key, record.expires_at, window
        );
        Ok(())
    }

    async fn refresh_record(&self, key: &str) -> StoreResult<()> {
        let full_key = self.full_key(key);

        if let Some(record) = self.fetch_record(&full_key).await? {
            if let Some(window) = record.native_expiry(Utc::now()) {
                self.expire_key(&full_key, window).await?;
                debug!("Redis cache refreshed for key: {}", key);
            }
        }

        Ok(())
    }

    /// Check Redis connectivity
    pub async fn health_check(&self) -> bool {
        let result = self
            .execute_with_retry(|conn| {
                Box::pin(async move { redis::cmd("PING").query_async::<_, String>(conn).await })
            })
            .await;

        matches!(result, Ok(response) if response == "PONG")
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            cleanup: false,
            sliding_expiration: true,
        }
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.get_record(key).await {
            Ok(value) => value,
            Err(e) => {
                error!("Error getting Redis cache for key {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], options: &EntryOptions) {
        if let Err(e) = self.set_record(key, value, options).await {
            error!("Error setting Redis cache for key {}: {}", key, e);
        }
    }

    async fn remove(&self, key: &str) {
        match self.delete_key(&self.full_key(key)).await {
            Ok(_) => info!("Redis cache removed for key: {}", key),
            Err(e) => error!("Error removing Redis cache for key {}: {}", key, e),
        }
    }

    async fn refresh(&self, key: &str) {
        if let Err(e) = self.refresh_record(key).await {
            error!("Error refreshing Redis cache for key {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testcontainers::{clients::Cli, core::WaitFor, GenericImage};

    fn redis_image() -> GenericImage {
        GenericImage::new("redis", "7-alpine")
            .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
    }

    async fn connect(port: u16) -> RedisCacheStore {
        let config = RedisCacheStoreConfig {
            url: format!("redis://127.0.0.1:{}", port),
            key_prefix: "test:cache:".to_string(),
            ..Default::default()
        };
        RedisCacheStore::connect(config).await.unwrap()
    }

    #[test]
    fn test_record_defaults_to_half_lifetime_sliding_window() {
        let now = Utc::now();
        let options = EntryOptions::expires_in(Duration::from_secs(300));
        let record = RemoteRecord::new(b"value", &options, Duration::from_secs(600), now).unwrap();

        assert_eq!(record.expires_at, now + chrono::Duration::seconds(300));
        assert_eq!(record.sliding_seconds, Some(150));
        assert_eq!(record.native_expiry(now), Some(Duration::from_secs(150)));
    }

    #[test]
    fn test_explicit_sliding_window_is_kept() {
        let now = Utc::now();
        let options = EntryOptions::expires_in(Duration::from_secs(300)).with_sliding(Duration::from_secs(30));
        let record = RemoteRecord::new(b"value", &options, Duration::from_secs(600), now).unwrap();

        assert_eq!(record.sliding_seconds, Some(30));
        assert_eq!(record.native_expiry(now), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_native_expiry_is_capped_by_absolute_expiry() {
        let now = Utc::now();
        let options = EntryOptions::expires_in(Duration::from_secs(300));
        let record = RemoteRecord::new(b"value", &options, Duration::from_secs(600), now).unwrap();

        let later = now + chrono::Duration::seconds(250);
        assert_eq!(record.native_expiry(later), Some(Duration::from_secs(50)));
        assert!(!record.is_expired_at(later));

        let after = now + chrono::Duration::seconds(301);
        assert_eq!(record.native_expiry(after), None);
        assert!(record.is_expired_at(after));
    }

    #[test]
    fn test_born_expired_record() {
        let now = Utc::now();
        let options = EntryOptions::expires_at(now - chrono::Duration::seconds(1));
        assert!(RemoteRecord::new(b"value", &options, Duration::from_secs(600), now).is_none());
    }

    #[test]
    fn test_record_wire_format() {
        let now = Utc::now();
        let record =
            RemoteRecord::new(b"value", &EntryOptions::default(), Duration::from_secs(600), now).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["data"], "dmFsdWU=");
        assert_eq!(json["slidingSeconds"], 300);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("expiresAt").is_some());

        let decoded: RemoteRecord = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, record);
    }

    #[tokio::test]
    #[ignore] // Requires Docker for Redis container
    async fn test_basic_operations() {
        let docker = Cli::default();
        let node = docker.run(redis_image());
        let store = connect(node.get_host_port_ipv4(6379)).await;

        let options = EntryOptions::expires_in(Duration::from_secs(60));
        store.set("test_key", b"test_value", &options).await;

        assert_eq!(store.get("test_key").await, Some(b"test_value".to_vec()));
        assert!(store.exists("test_key").await);

        store.remove("test_key").await;
        assert!(!store.exists("test_key").await);
        store.remove("test_key").await;
    }

    #[tokio::test]
    #[ignore] // Requires Docker for Redis container
    async fn test_ttl_expiration() {
        let docker = Cli::default();
        let node = docker.run(redis_image());
        let store = connect(node.get_host_port_ipv4(6379)).await;

        store
            .set("expire_test", b"expire_value", &EntryOptions::expires_in(Duration::from_secs(1)))
            .await;
        assert!(store.exists("expire_test").await);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.get("expire_test").await, None);
    }

    async fn raw_connection(store: &RedisCacheStore) -> ConnectionManager {
        store.connection_manager.read().await.clone()
    }

    async fn pttl(conn: &mut ConnectionManager, full_key: &str) -> i64 {
        redis::cmd("PTTL")
            .arg(full_key)
            .query_async(conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires Docker for Redis container
    async fn test_record_past_expires_at_is_deleted_on_read() {
        let docker = Cli::default();
        let node = docker.run(redis_image());
        let store = connect(node.get_host_port_ipv4(6379)).await;
        let mut conn = raw_connection(&store).await;

        let now = Utc::now();
        let record = RemoteRecord {
            data: Payload::from(&b"stale"[..]),
            created_at: now - chrono::Duration::minutes(10),
            expires_at: now - chrono::Duration::minutes(5),
            sliding_seconds: Some(150),
        };
        let full_key = store.full_key("stale_key");
        redis::cmd("SET")
            .arg(&full_key)
            .arg(serde_json::to_vec(&record).unwrap())
            .query_async::<_, ()>(&mut conn)
            .await
            .unwrap();

        assert_eq!(store.get("stale_key").await, None);

        let remaining: i64 = redis::cmd("EXISTS")
            .arg(&full_key)
            .query_async(&mut conn)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    #[ignore] // Requires Docker for Redis container
    async fn test_read_rearms_sliding_window() {
        let docker = Cli::default();
        let node = docker.run(redis_image());
        let store = connect(node.get_host_port_ipv4(6379)).await;
        let mut conn = raw_connection(&store).await;

        let options = EntryOptions::expires_in(Duration::from_secs(300))
            .with_sliding(Duration::from_secs(30));
        store.set("sliding_key", b"value", &options).await;

        let full_key = store.full_key("sliding_key");
        let initial = pttl(&mut conn, &full_key).await;
        assert!(initial > 0 && initial <= 30_000);

        redis::cmd("PEXPIRE")
            .arg(&full_key)
            .arg(2_000)
            .query_async::<_, i64>(&mut conn)
            .await
            .unwrap();
        assert!(pttl(&mut conn, &full_key).await <= 2_000);

        assert_eq!(store.get("sliding_key").await, Some(b"value".to_vec()));
        assert!(pttl(&mut conn, &full_key).await > 20_000);

        redis::cmd("PEXPIRE")
            .arg(&full_key)
            .arg(2_000)
            .query_async::<_, i64>(&mut conn)
            .await
            .unwrap();
        store.refresh("sliding_key").await;
        assert!(pttl(&mut conn, &full_key).await > 20_000);
    }

    #[tokio::test]
    #[ignore] // Requires Docker for Redis container
    async fn test_concurrent_commands_share_connection() {
        let docker = Cli::default();
        let node = docker.run(redis_image());
        let store = std::sync::Arc::new(connect(node.get_host_port_ipv4(6379)).await);

        let options = EntryOptions::expires_in(Duration::from_secs(60));
        let writes = (0..20).map(|i| {
            let store = std::sync::Arc::clone(&store);
            let options = options.clone();
            async move {
                let key = format!("concurrent_{}", i);
                store.set(&key, key.as_bytes(), &options).await;
                store.get(&key).await
            }
        });

        for (i, value) in futures::future::join_all(writes).await.into_iter().enumerate() {
            assert_eq!(value, Some(format!("concurrent_{}", i).into_bytes()));
        }
    }

    #[tokio::test]
    #[ignore] // Requires Docker for Redis container
    async fn test_cleanup_is_unsupported() {
        let docker = Cli::default();
        let node = docker.run(redis_image());
        let store = connect(node.get_host_port_ipv4(6379)).await;

        assert!(store.health_check().await);
        assert!(!store.capabilities().cleanup);
        assert!(matches!(
            store.cleanup_expired().await,
            Err(CacheError::Unsupported { backend: "redis", .. })
        ));
    }
}
