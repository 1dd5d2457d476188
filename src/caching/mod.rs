//! # Caching Engine Module
//!
//! This module provides the read-through/write-through caching layer that sits in
//! front of a slow origin. It supports a content-hashed file store and a Redis
//! store behind one backend contract, with TTL-based expiration.
//!
//! ## Features
//! - Deterministic, collision-resistant storage keys
//! - Self-describing entry records (`data`, `createdAt`, `expiresAt`)
//! - File store with a store-wide lock, lazy eviction and an expiry sweep
//! - Redis store with native expiration mirrored from entry metadata
//! - Cache-aside `get_or_set` with provenance reporting
//!
//! ## Architecture
//! The caching system follows a layered approach:
//! 1. **Cache Service**: typed facade and cache-aside orchestration
//! 2. **Cache Stores**: file and Redis implementations of [`CacheStore`]
//! 3. **Entry codec**: record layout shared by the stores
//! 4. **Key generator**: cache key to storage identifier mapping
//!
//! ## Usage Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cache_aside::caching::{CacheService, FileCacheStore, FileCacheStoreConfig};
//!
//! let store = FileCacheStore::new(FileCacheStoreConfig::default());
//! let cache = CacheService::new(Arc::new(store), Duration::from_secs(600));
//!
//! let users = cache
//!     .get_or_set_with_provenance("all_users", || async { load_users().await.map(Some) }, None)
//!     .await?;
//! if users.is_from_cache {
//!     // served without touching the origin
//! }
//! ```

pub mod cache_service;
pub mod entry;
pub mod key_generator;
pub mod stores;

pub use cache_service::{
    CacheBackend, CacheConfig, CacheResult, CacheService, CacheSource, CacheStats, RedisSettings,
};
pub use entry::{CacheEntry, EntryOptions, Payload};
pub use key_generator::StorageKey;
pub use stores::{
    CacheStore, FileCacheStore, FileCacheStoreConfig, RedisCacheStore, RedisCacheStoreConfig,
    StoreCapabilities,
};

/// Result type used inside the cache stores
pub type StoreResult<T> = Result<T, CacheError>;

/// Cache-specific error types
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Operation '{operation}' is not supported by the {backend} cache backend")]
    Unsupported {
        operation: &'static str,
        backend: &'static str,
    },

    #[error("Cache configuration error: {message}")]
    Configuration { message: String },
}

impl CacheError {
    /// Create an unsupported-operation error for a backend
    pub fn unsupported(operation: &'static str, backend: &'static str) -> Self {
        Self::Unsupported { operation, backend }
    }
}
