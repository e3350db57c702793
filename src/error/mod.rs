//! Error types and Result aliases for tagindex.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.
//!
//! Per-file failures (`ScanError`) are normally converted into scan outcomes
//! by the scheduler and never reach the user.

use thiserror::Error;

/// Result type alias using tagindex's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tagindex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Cache storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// File content could not be scanned.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors reported by the tag scanner for unusable file content.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Content looks like binary data.
    #[error("binary content")]
    Binary,

    /// Content is not valid UTF-8.
    #[error("invalid UTF-8 at byte {valid_up_to}")]
    Decode { valid_up_to: usize },

    /// File exceeds the configured size ceiling.
    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// Event channel was closed.
    #[error("event channel closed")]
    Closed,
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl StorageError {
    /// Wrap a `rusqlite` error with context.
    pub fn database(context: &str, err: &rusqlite::Error) -> Self {
        Self::Database(format!("{context}: {err}"))
    }
}

#[cfg(test)]
mod tests;
