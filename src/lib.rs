//! # Cache Aside - Core Library Crate
//!
//! A read-through/write-through caching layer that sits in front of a slow origin.
//! Callers use [`CacheService`]; entries live in a file store or in Redis.
//!
//! ## Modules
//! - `caching`: key encoding, entry records, stores and the cache facade
//! - `core`: configuration and error types
//! - `observability`: logging setup
//! - `repository`: the origin the cache fronts
//! - `api`: HTTP routes over the facade

/// Caching engine: stores, entry codec and the cache-aside facade
pub mod caching;

/// Configuration and error handling
pub mod core;

/// Structured logging
pub mod observability;

/// Origin data access
pub mod repository;

/// HTTP surface
pub mod api;

pub use api::{router, AppState};
pub use caching::{CacheError, CacheResult, CacheService, CacheSource, CacheStore};
pub use core::config::AppConfig;
pub use core::error::{ServiceError, ServiceResult};
pub use repository::{InMemoryUserRepository, User, UserRepository};
