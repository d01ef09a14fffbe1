//! # Tile Cache Errors

use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Tile cache errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CacheError {
    #[error("Cache entry not found: {0}")]
    EntryNotFound(String),

    /// Path would escape the cache root or contains a separator
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Epoch marker exists but does not hold a number
    #[error("Corrupt epoch marker: {0}")]
    CorruptEpoch(String),

    #[error("I/O error: {0}")]
    IoError(String),
}
