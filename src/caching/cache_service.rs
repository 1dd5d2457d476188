//! # Cache Service
//!
//! The cache service is the typed facade callers depend on. It serializes values
//! to JSON, delegates storage to whichever [`CacheStore`] was configured, and runs
//! the cache-aside flow: serve from cache on a hit, otherwise call the origin
//! factory, store its value and report where the response came from.
//!
//! Concurrent misses on the same key are not coalesced. Each caller runs the
//! factory and writes its own result; the last write wins.

use super::entry::EntryOptions;
use super::stores::{
    CacheStore, FileCacheStore, FileCacheStoreConfig, RedisCacheStore, RedisCacheStoreConfig,
};
use super::{CacheError, StoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Cache backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// One JSON file per key under a local directory
    File,
    /// Records in a Redis server
    Redis,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default expiration for cached items, in minutes
    pub default_expiration_minutes: u64,

    /// Which backend stores the entries
    pub backend: CacheBackend,

    /// Directory of the file backend, relative to `content_root` when set
    pub file_cache_directory: PathBuf,

    /// Root that a relative `file_cache_directory` is resolved against
    pub content_root: Option<PathBuf>,

    /// Interval of the background expiry sweep (file backend only)
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Option<Duration>,

    /// Redis backend settings
    pub redis: RedisSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,

    /// Namespace of the cache records, first part of the key prefix
    pub schema_name: String,

    /// Table of the cache records, second part of the key prefix
    pub table_name: String,

    /// Explicit key prefix, overrides schema and table
    pub key_prefix: Option<String>,

    /// Maximum number of connection retries
    pub max_retries: u32,

    /// Retry delay
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_expiration_minutes: 10,
            backend: CacheBackend::File,
            file_cache_directory: PathBuf::from("CacheData"),
            content_root: None,
            cleanup_interval: None,
            redis: RedisSettings::default(),
        }
    }
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            schema_name: "dbo".to_string(),
            table_name: "AppCache".to_string(),
            key_prefix: None,
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl CacheConfig {
    /// Default TTL for cached items.
    ///
    /// Fails when the minutes are zero or do not fit a `Duration` in seconds.
    pub fn default_ttl(&self) -> StoreResult<Duration> {
        if self.default_expiration_minutes == 0 {
            return Err(CacheError::Configuration {
                message: "default_expiration_minutes must be greater than zero".to_string(),
            });
        }

        self.default_expiration_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| CacheError::Configuration {
                message: format!(
                    "default_expiration_minutes is too large: {}",
                    self.default_expiration_minutes
                ),
            })
    }

    /// Directory of the file backend after resolving it against `content_root`
    pub fn resolved_file_directory(&self) -> PathBuf {
        match &self.content_root {
            Some(root) if self.file_cache_directory.is_relative() => {
                root.join(&self.file_cache_directory)
            }
            _ => self.file_cache_directory.clone(),
        }
    }
}

impl RedisSettings {
    /// Prefix put in front of every record key
    pub fn key_prefix(&self) -> String {
        self.key_prefix
            .clone()
            .unwrap_or_else(|| format!("{}:{}:", self.schema_name, self.table_name))
    }
}

/// Where a cache-aside response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
    /// Served from the cache
    Cache,
    /// Loaded from the origin and cached
    Origin,
    /// The origin had nothing to return
    None,
}

/// Provenance of a single get-or-set call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheResult<T> {
    pub data: Option<T>,
    pub source: CacheSource,
    pub is_from_cache: bool,
}

impl<T> CacheResult<T> {
    pub fn from_cache(data: T) -> Self {
        Self {
            data: Some(data),
            source: CacheSource::Cache,
            is_from_cache: true,
        }
    }

    pub fn from_origin(data: T) -> Self {
        Self {
            data: Some(data),
            source: CacheSource::Origin,
            is_from_cache: false,
        }
    }

    pub fn none() -> Self {
        Self {
            data: None,
            source: CacheSource::None,
            is_from_cache: false,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Typed reads answered from the cache
    pub hits: u64,

    /// Typed reads that found nothing usable
    pub misses: u64,

    /// Factory invocations on a miss
    pub origin_loads: u64,

    /// Values written
    pub writes: u64,

    /// Explicit removals
    pub removals: u64,

    /// Cache hit ratio
    pub hit_ratio: f64,
}

#[derive(Default)]
struct StatCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    origin_loads: AtomicU64,
    writes: AtomicU64,
    removals: AtomicU64,
}

/// Typed cache facade over a cache store
pub struct CacheService {
    /// Backend storing the entries
    store: Arc<dyn CacheStore>,

    /// TTL used when a caller passes none
    default_ttl: Duration,

    /// Statistics counters
    stats: StatCounters,
}

impl CacheService {
    /// Create a cache service over an existing store
    pub fn new(store: Arc<dyn CacheStore>, default_ttl: Duration) -> Self {
        Self {
            store,
            default_ttl,
            stats: StatCounters::default(),
        }
    }

    /// Build the store selected by the configuration and wrap it
    pub async fn from_config(config: &CacheConfig) -> StoreResult<Self> {
        let default_ttl = config.default_ttl()?;

        let store: Arc<dyn CacheStore> = match config.backend {
            CacheBackend::File => {
                let directory = config.resolved_file_directory();
                info!("File cache initialized at {}", directory.display());
                let store = FileCacheStore::new(FileCacheStoreConfig {
                    directory,
                    default_ttl,
                    ..Default::default()
                });
                Arc::new(store)
            }
            CacheBackend::Redis => {
                let store = RedisCacheStore::connect(RedisCacheStoreConfig {
                    url: config.redis.url.clone(),
                    key_prefix: config.redis.key_prefix(),
                    default_ttl,
                    max_retries: config.redis.max_retries,
                    retry_delay: config.redis.retry_delay,
                })
                .await?;
                info!("Redis cache initialized at {}", config.redis.url);
                Arc::new(store)
            }
        };

        Ok(Self::new(store, default_ttl))
    }

    /// Backend storing the entries
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// TTL used when a caller passes none
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get a typed value, `None` on miss or if the stored bytes don't decode as `T`
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.store.get(key).await {
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Cached value for key {} could not be decoded: {}", key, e);
                    None
                }
            },
            None => None,
        };

        let counter = if value.is_some() {
            &self.stats.hits
        } else {
            &self.stats.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);

        value
    }

    /// Store a typed value for `ttl`, or the default TTL
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Error serializing cache value for key {}: {}", key, e);
                return;
            }
        };

        let options = EntryOptions::expires_in(ttl.unwrap_or(self.default_ttl));
        self.store.set(key, &bytes, &options).await;
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Delete the entry for `key`
    pub async fn remove(&self, key: &str) {
        self.store.remove(key).await;
        self.stats.removals.fetch_add(1, Ordering::Relaxed);
    }

    /// Check if a live entry exists for `key`
    pub async fn exists(&self, key: &str) -> bool {
        self.store.exists(key).await
    }

    /// Reset the sliding expiration of `key` on stores that have one
    pub async fn refresh(&self, key: &str) {
        self.store.refresh(key).await;
    }

    /// Return the cached value, or load it from `factory` and cache it.
    ///
    /// A factory error is returned unchanged and nothing is cached. `Ok(None)` from
    /// the factory is not cached either.
    pub async fn get_or_set<T, F, Fut, E>(
        &self,
        key: &str,
        factory: F,
        ttl: Option<Duration>,
    ) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let result = self.get_or_set_with_provenance(key, factory, ttl).await?;
        Ok(result.data)
    }

    /// Same as [`get_or_set`](Self::get_or_set), also reporting the source
    pub async fn get_or_set_with_provenance<T, F, Fut, E>(
        &self,
        key: &str,
        factory: F,
        ttl: Option<Duration>,
    ) -> Result<CacheResult<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            debug!("Data retrieved from cache for key: {}", key);
            return Ok(CacheResult::from_cache(cached));
        }

        info!("Cache miss - executing factory for key: {}", key);
        self.stats.origin_loads.fetch_add(1, Ordering::Relaxed);

        match factory().await? {
            Some(data) => {
                self.set(key, &data, ttl).await;
                Ok(CacheResult::from_origin(data))
            }
            None => {
                debug!("Factory returned nothing for key: {}", key);
                Ok(CacheResult::none())
            }
        }
    }

    /// Sweep expired entries. Fails with [`CacheError::Unsupported`] on stores
    /// without the cleanup capability.
    pub async fn cleanup_expired(&self) -> StoreResult<usize> {
        if !self.store.capabilities().cleanup {
            return Err(CacheError::unsupported("cleanup_expired", self.store.name()));
        }

        self.store.cleanup_expired().await
    }

    /// Spawn a task sweeping expired entries every `every`.
    ///
    /// Returns `None` when the store has no cleanup capability.
    pub fn spawn_cleanup_task(self: &Arc<Self>, every: Duration) -> Option<JoinHandle<()>> {
        if !self.store.capabilities().cleanup {
            warn!(
                "Periodic cleanup requested but the {} cache backend does not support it",
                self.store.name()
            );
            return None;
        }

        let service = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so startup isn't a sweep.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(e) = service.cleanup_expired().await {
                    warn!("Periodic cache cleanup failed: {}", e);
                }
            }
        }))
    }

    /// Snapshot of the statistics counters
    pub fn stats(&self) -> CacheStats {
        let hits = self.stats.hits.load(Ordering::Relaxed);
        let misses = self.stats.misses.load(Ordering::Relaxed);
        let reads = hits + misses;

        CacheStats {
            hits,
            misses,
            origin_loads: self.stats.origin_loads.load(Ordering::Relaxed),
            writes: self.stats.writes.load(Ordering::Relaxed),
            removals: self.stats.removals.load(Ordering::Relaxed),
            hit_ratio: if reads > 0 {
                hits as f64 / reads as f64
            } else {
                0.0
            },
        }
    }
}
