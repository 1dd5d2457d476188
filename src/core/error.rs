//! # Error Handling Module
//!
//! Errors of the application shell around the cache: configuration loading,
//! origin failures and the HTTP surface. Cache stores never surface their own I/O
//! failures here; they degrade to a miss. The one cache error that reaches callers
//! is an unsupported operation, which maps to `400 Bad Request`.

use crate::caching::CacheError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the service
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error types for the cache service
#[derive(Debug, Error, Clone)]
pub enum ServiceError {
    /// Configuration-related errors (invalid config, missing files, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Operation the configured cache backend does not support
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    /// Cache errors that are not a degraded miss
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Origin repository failures
    #[error("Origin error: {message}")]
    Origin { message: String },

    /// Internal server errors for unexpected failures
    #[error("Internal server error: {message}")]
    Internal { message: String },

    /// I/O errors reading configuration files
    #[error("I/O error: {message}")]
    Io { message: String },

    /// JSON configuration parsing errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },
}

impl ServiceError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an origin error with a custom message
    pub fn origin<S: Into<String>>(message: S) -> Self {
        Self::Origin {
            message: message.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidOperation { .. } => StatusCode::BAD_REQUEST,
            Self::Origin { .. } => StatusCode::BAD_GATEWAY,
            Self::Configuration { .. }
            | Self::Cache { .. }
            | Self::Internal { .. }
            | Self::Io { .. }
            | Self::Json { .. }
            | Self::Yaml { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a string representation of the error type for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::InvalidOperation { .. } => "invalid_operation",
            Self::Cache { .. } => "cache_error",
            Self::Origin { .. } => "origin_error",
            Self::Internal { .. } => "internal_error",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::Yaml { .. } => "yaml_error",
        }
    }
}

impl From<CacheError> for ServiceError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Unsupported { .. } => Self::InvalidOperation {
                message: err.to_string(),
            },
            CacheError::Configuration { message } => Self::Configuration { message },
            other => Self::Cache {
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for ServiceError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

/// Convert errors into JSON HTTP responses with a matching status code
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_response = json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status, Json(error_response)).into_response()
    }
}
