//! # Configuration Module
//!
//! Static settings read once at startup: server bind address, cache backend and
//! expiration, Redis connection, and logging.
//!
//! ## Key Features
//! - YAML/JSON configuration parsing with serde
//! - Environment variable override support
//! - Validation with detailed error messages

use crate::caching::{CacheBackend, CacheConfig};
use crate::core::error::{ServiceError, ServiceResult};
use crate::observability::config::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use url::Url;

/// Main service configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Logging settings
    pub logging: LogConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    pub bind_address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> ServiceResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut config: AppConfig = serde_yaml::from_str(&content)?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON
    pub async fn load_from_json<P: AsRef<Path>>(path: P) -> ServiceResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut config: AppConfig = serde_json::from_str(&content)?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise start from defaults
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> ServiceResult<Self> {
        if tokio::fs::metadata(path.as_ref()).await.is_ok() {
            return Self::load_from_file(path).await;
        }

        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Environment variables follow the pattern: CACHE_<FIELD>
    /// For example: CACHE_DEFAULT_EXPIRATION_MINUTES=5
    pub fn apply_env_overrides(&mut self) -> ServiceResult<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ServiceResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(minutes) = lookup("CACHE_DEFAULT_EXPIRATION_MINUTES") {
            self.cache.default_expiration_minutes = minutes
                .parse()
                .map_err(|_| ServiceError::config("Invalid CACHE_DEFAULT_EXPIRATION_MINUTES"))?;
        }

        if let Some(backend) = lookup("CACHE_BACKEND") {
            self.cache.backend = match backend.to_lowercase().as_str() {
                "file" => CacheBackend::File,
                "redis" => CacheBackend::Redis,
                other => {
                    return Err(ServiceError::config(format!(
                        "Invalid CACHE_BACKEND: {}",
                        other
                    )))
                }
            };
        }

        if let Some(directory) = lookup("CACHE_FILE_DIRECTORY") {
            self.cache.file_cache_directory = PathBuf::from(directory);
        }

        if let Some(root) = lookup("CACHE_CONTENT_ROOT") {
            self.cache.content_root = Some(PathBuf::from(root));
        }

        if let Some(interval) = lookup("CACHE_CLEANUP_INTERVAL") {
            self.cache.cleanup_interval = Some(
                humantime::parse_duration(&interval)
                    .map_err(|_| ServiceError::config("Invalid CACHE_CLEANUP_INTERVAL"))?,
            );
        }

        if let Some(url) = lookup("CACHE_REDIS_URL") {
            self.cache.redis.url = url;
        }

        if let Some(addr) = lookup("CACHE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = addr
                .parse()
                .map_err(|_| ServiceError::config("Invalid CACHE_SERVER_BIND_ADDRESS"))?;
        }

        if let Some(level) = lookup("CACHE_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("CACHE_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => {
                    return Err(ServiceError::config(format!(
                        "Invalid CACHE_LOG_FORMAT: {}",
                        other
                    )))
                }
            };
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ServiceResult<()> {
        self.cache.default_ttl()?;

        if matches!(self.cache.cleanup_interval, Some(interval) if interval.is_zero()) {
            return Err(ServiceError::config("cache.cleanup_interval must not be zero"));
        }

        if self.cache.backend == CacheBackend::File
            && self.cache.file_cache_directory.as_os_str().is_empty()
        {
            return Err(ServiceError::config("cache.file_cache_directory must not be empty"));
        }

        if self.cache.backend == CacheBackend::Redis {
            let url = Url::parse(&self.cache.redis.url)
                .map_err(|e| ServiceError::config(format!("Invalid Redis URL: {}", e)))?;
            if !matches!(url.scheme(), "redis" | "rediss") {
                return Err(ServiceError::config(format!(
                    "Unsupported Redis URL scheme: {}",
                    url.scheme()
                )));
            }
        }

        Ok(())
    }
}
