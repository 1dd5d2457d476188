//! # Cache Stores Module
//!
//! This module provides the cache store implementations: a file store that keeps
//! one JSON file per key, and a Redis-based store.
//!
//! Stores are best-effort. I/O and decoding failures are logged at the store
//! boundary and reported as a miss (or a no-op for writes), so a broken cache
//! never breaks the origin path.

pub mod file_store;
pub mod redis_store;

pub use file_store::{FileCacheStore, FileCacheStoreConfig};
pub use redis_store::{RedisCacheStore, RedisCacheStoreConfig};

use super::entry::EntryOptions;
use super::{CacheError, StoreResult};
use async_trait::async_trait;
use serde::Serialize;

/// Optional features a store may support beyond get/set/remove/exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCapabilities {
    /// Store can sweep and delete expired entries on demand
    pub cleanup: bool,

    /// Store honors sliding expiration windows on refresh and read
    pub sliding_expiration: bool,
}

/// Trait for cache store implementations
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name used in logs and errors
    fn name(&self) -> &'static str;

    /// Features supported by this store
    fn capabilities(&self) -> StoreCapabilities;

    /// Get the payload stored under `key`, `None` when absent or expired
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store a payload under `key`
    async fn set(&self, key: &str, value: &[u8], options: &EntryOptions);

    /// Delete the entry for `key`; absent keys are not an error
    async fn remove(&self, key: &str);

    /// Check if a live entry exists for `key`
    async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Reset the sliding expiration of `key`, if the store has one
    async fn refresh(&self, key: &str);

    /// Delete every expired entry and return how many were removed
    async fn cleanup_expired(&self) -> StoreResult<usize> {
        Err(CacheError::unsupported("cleanup_expired", self.name()))
    }
}
