//! # Cache Backend Trait

use std::fmt::Debug;
use std::time::SystemTime;

use super::errors::CacheResult;

/// Byte store behind the tile cache. Paths are `/`-separated and relative.
pub trait CacheBackend: Send + Sync + Debug {
    /// Write data to path; readers never observe a partial write
    fn write(&self, path: &str, data: &[u8]) -> CacheResult<()>;

    /// Read data from path
    fn read(&self, path: &str) -> CacheResult<Vec<u8>>;

    /// Delete file at path
    fn delete(&self, path: &str) -> CacheResult<()>;

    /// Check if path exists
    fn exists(&self, path: &str) -> CacheResult<bool>;

    /// Names of the direct children of a directory
    fn list(&self, prefix: &str) -> CacheResult<Vec<String>>;

    /// Remove a directory and everything below it; missing is not an error
    fn delete_prefix(&self, prefix: &str) -> CacheResult<()>;

    /// Total bytes of every file below prefix
    fn size(&self, prefix: &str) -> CacheResult<u64>;

    /// Last modification time of the file at path
    fn modified(&self, path: &str) -> CacheResult<SystemTime>;
}
