//! Error types for cache operations
//!
//! Errors defined here are internal to the cache layer: the [`ResponseCache`]
//! facade absorbs them (logging and degrading to a miss or a no-op) so the
//! request path never sees a cache failure. Configuration loading is the one
//! place they reach the caller.
//!
//! [`ResponseCache`]: crate::cache::ResponseCache

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cache and pricing operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem error on a specific path
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The cache directory could not be initialized
    #[error("Cache is disabled")]
    Disabled,
}

impl CacheError {
    /// Wrap an `io::Error` with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the underlying cause is a missing file
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CacheError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
