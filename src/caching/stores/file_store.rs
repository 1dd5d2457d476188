//! # File Cache Store
//!
//! This module provides a file-based cache implementation: one JSON entry file per
//! cache key under a root directory, with lazy eviction of expired entries on read
//! and an on-demand sweep.
//!
//! Every operation takes the same store-wide lock for its whole duration, so at most
//! one file operation runs at a time per store. The lock is not reentrant: code that
//! already holds it (expired-entry eviction in `get`, the sweep) calls the unlocked
//! helpers below and never the public `remove`.

use super::{CacheStore, StoreCapabilities};
use crate::caching::entry::{
    decode_entry, decode_expiry, encode_entry, CacheEntry, EntryOptions, Payload,
};
use crate::caching::key_generator::StorageKey;
use crate::caching::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Suffix of in-flight writes. Writes run under the store lock, so any such file
/// seen by the sweep was left behind by a cancelled or failed write.
const TEMP_SUFFIX: &str = ".tmp";

/// File cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCacheStoreConfig {
    /// Directory holding the entry files, created on first write
    pub directory: PathBuf,

    /// TTL applied when a write carries no expiration
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Extension of entry files
    pub extension: String,
}

impl Default for FileCacheStoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("CacheData"),
            default_ttl: Duration::from_secs(10 * 60),
            extension: "json".to_string(),
        }
    }
}

/// File cache implementation
pub struct FileCacheStore {
    /// Configuration
    config: FileCacheStoreConfig,

    /// Store-wide exclusivity for file operations
    lock: Mutex<()>,
}

impl FileCacheStore {
    /// Create a new file cache. The directory is not touched until the first write.
    pub fn new(config: FileCacheStoreConfig) -> Self {
        Self {
            config,
            lock: Mutex::new(()),
        }
    }

    /// Root directory of the store
    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    /// Path of the entry file for a cache key
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.config
            .directory
            .join(format!("{}.{}", StorageKey::encode(key), self.config.extension))
    }

    // Unlocked primitives. Callers must hold `self.lock`.

    fn is_temp_file(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.') && name.ends_with(TEMP_SUFFIX))
    }

    async fn read_entry(path: &Path) -> StoreResult<Option<CacheEntry<Payload>>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(decode_entry(&bytes)?))
    }

    async fn delete_file(path: &Path) -> StoreResult<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temporary file and rename it into place
    async fn write_file(&self, path: &Path, bytes: &[u8]) -> StoreResult<()> {
        if tokio::fs::metadata(&self.config.directory).await.is_err() {
            tokio::fs::create_dir_all(&self.config.directory).await?;
            info!("Cache directory created at: {}", self.config.directory.display());
        }

        let tmp_path = self
            .config
            .directory
            .join(format!(".{}{}", Uuid::new_v4(), TEMP_SUFFIX));
        let written = match tokio::fs::write(&tmp_path, bytes).await {
            Ok(()) => tokio::fs::rename(&tmp_path, path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn get_unlocked(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key);

        let Some(entry) = Self::read_entry(&path).await? else {
            debug!("Cache miss for key: {} - file not found", key);
            return Ok(None);
        };

        if entry.is_expired_at(Utc::now()) {
            info!("Cache expired for key: {}", key);
            if Self::delete_file(&path).await? {
                debug!("Expired cache file deleted for key: {}", key);
            }
            return Ok(None);
        }

        debug!("Cache hit for key: {}, expires at: {}", key, entry.expires_at);
        Ok(Some(entry.data.into_bytes()))
    }

    async fn set_unlocked(&self, key: &str, value: &[u8], options: &EntryOptions) -> StoreResult<()> {
        let path = self.path_for(key);
        let now = Utc::now();
        let expires_at = options.resolve_expiry(now, self.config.default_ttl);

        let Some(entry) = CacheEntry::new(Payload::from(value), now, expires_at) else {
            warn!(
                "Cache entry for key: {} would expire at {} before creation, not stored",
                key, expires_at
            );
            Self::delete_file(&path).await?;
            return Ok(());
        };

        let bytes = encode_entry(&entry)?;
        self.write_file(&path, &bytes).await?;

        info!(
            "Cache set for key: {} at path: {}, expires at: {}",
            key,
            path.display(),
            entry.expires_at
        );
        Ok(())
    }

    async fn sweep_unlocked(&self) -> StoreResult<usize> {
        let mut dir = match tokio::fs::read_dir(&self.config.directory).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        let mut deleted = 0;

        while let Some(dir_entry) = dir.next_entry().await? {
            let path = dir_entry.path();
            if Self::is_temp_file(&path) {
                match Self::delete_file(&path).await {
                    Ok(_) => debug!("Removed orphaned temp file {}", path.display()),
                    Err(e) => warn!("Error removing temp file {}: {}", path.display(), e),
                }
                continue;
            }

            if path.extension().and_then(|ext| ext.to_str()) != Some(self.config.extension.as_str()) {
                continue;
            }

            match Self::sweep_file(&path, now).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => warn!("Error processing cache file {}: {}", path.display(), e),
            }
        }

        Ok(deleted)
    }

    /// Delete one entry file if it is expired. Only the expiration is decoded, so
    /// an entry with a damaged payload is still collected.
    async fn sweep_file(path: &Path, now: DateTime<Utc>) -> StoreResult<bool> {
        let bytes = tokio::fs::read(path).await?;
        let header = decode_expiry(&bytes)?;

        if now > header.expires_at {
            return Self::delete_file(path).await;
        }

        Ok(false)
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            cleanup: true,
            sliding_expiration: false,
        }
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let _guard = self.lock.lock().await;

        match self.get_unlocked(key).await {
            Ok(value) => value,
            Err(e) => {
                error!("Error getting cache for key {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], options: &EntryOptions) {
        let _guard = self.lock.lock().await;

        if let Err(e) = self.set_unlocked(key, value, options).await {
            error!("Error setting cache for key {}: {}", key, e);
        }
    }

    async fn remove(&self, key: &str) {
        let _guard = self.lock.lock().await;
        let path = self.path_for(key);

        match Self::delete_file(&path).await {
            Ok(true) => info!("Cache removed for key: {} at path: {}", key, path.display()),
            Ok(false) => debug!("Cache file not found for key: {}", key),
            Err(e) => error!("Error removing cache for key {}: {}", key, e),
        }
    }

    async fn refresh(&self, key: &str) {
        // Absolute expiration only, nothing to extend.
        debug!("Refresh called for key: {} (no-op for file cache)", key);
    }

    async fn cleanup_expired(&self) -> StoreResult<usize> {
        let _guard = self.lock.lock().await;

        let deleted = self.sweep_unlocked().await.map_err(|e| {
            error!("Error during cache cleanup: {}", e);
            e
        })?;

        info!("Cleanup completed. Deleted {} expired cache files", deleted);
        Ok(deleted)
    }
}
