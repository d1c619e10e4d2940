//! Error types for document loading, sanitization and the listener.

use std::net::SocketAddr;
use thiserror::Error;

/// Reasons a decoded document is rejected before it reaches the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    /// The document root is not a mapping.
    #[error("Invalid OpenAPI document: expected a mapping at the root, got {actual}")]
    InvalidDocument { actual: &'static str },

    /// A version field is present but not a string.
    #[error("OpenAPI document '{field}' field must be a string, got {actual}")]
    InvalidVersionType {
        field: &'static str,
        actual: &'static str,
    },

    /// Neither `swagger` nor `openapi` is set.
    #[error("OpenAPI document missing required version field (swagger or openapi)")]
    MissingVersion,

    /// A value that has no plain-data representation (tagged value, composite key).
    #[error("Non-data value at {location}: {reason}")]
    NonDataValue {
        location: String,
        reason: &'static str,
    },
}

/// Failure of a single load attempt.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The source text could not be decoded as YAML or JSON.
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Listener lifecycle errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to bind mock listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
