//! # Tile Cache
//!
//! Read-through store of encoded tiles, versioned per table by an epoch.
//!
//! Invalidating a table bumps its epoch; entries written under older epochs
//! are unreachable from then on and are removed by [`TileCache::purge_stale`].
//! The current epoch is persisted in a marker file so a restarted process
//! never serves a dead epoch.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use crate::catalog::TableRef;

use super::backend::CacheBackend;
use super::errors::{CacheError, CacheResult};
use super::key::{epoch_dir, epoch_marker_path, parse_epoch_dir, table_dir, TileKey};
use super::local::LocalBackend;

/// A miss; fill it with the computed tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTile {
    key: TileKey,
    epoch: u64,
}

impl PendingTile {
    pub fn key(&self) -> &TileKey {
        &self.key
    }

    /// Table epoch observed when the miss happened
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Outcome of [`TileCache::probe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Cached(Vec<u8>),
    Pending(PendingTile),
}

/// Epoch-versioned tile cache
#[derive(Debug)]
pub struct TileCache {
    backend: Arc<dyn CacheBackend>,
    epochs: RwLock<HashMap<TableRef, u64>>,
    max_age: Duration,
}

impl TileCache {
    pub fn new(backend: Arc<dyn CacheBackend>, max_age: Duration) -> Self {
        Self {
            backend,
            epochs: RwLock::new(HashMap::new()),
            max_age,
        }
    }

    /// Cache under a local directory
    pub fn local(root: impl Into<std::path::PathBuf>, max_age: Duration) -> Self {
        Self::new(Arc::new(LocalBackend::new(root)), max_age)
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn enabled(&self) -> bool {
        !self.max_age.is_zero()
    }

    /// Current epoch of `table`, loading the persisted marker on first use
    pub fn current_epoch(&self, table: &TableRef) -> CacheResult<u64> {
        if let Some(epoch) = self.read_epochs()?.get(table) {
            return Ok(*epoch);
        }

        let mut epochs = self.write_epochs()?;
        if let Some(epoch) = epochs.get(table) {
            return Ok(*epoch);
        }
        let epoch = self.load_marker(table)?;
        epochs.insert(table.clone(), epoch);
        Ok(epoch)
    }

    /// Cached bytes for `key`, if present and fresh
    pub fn lookup(&self, key: &TileKey) -> CacheResult<Option<Vec<u8>>> {
        if !self.enabled() {
            return Ok(None);
        }
        let epoch = self.current_epoch(&key.table)?;
        self.read_fresh(&key.path(epoch)?)
    }

    /// Lookup that, on a miss, captures the epoch to fill later
    pub fn probe(&self, key: &TileKey) -> CacheResult<Probe> {
        let epoch = self.current_epoch(&key.table)?;

        if self.enabled() {
            if let Some(bytes) = self.read_fresh(&key.path(epoch)?)? {
                return Ok(Probe::Cached(bytes));
            }
        }

        Ok(Probe::Pending(PendingTile {
            key: key.clone(),
            epoch,
        }))
    }

    /// Store under the current epoch
    pub fn store(&self, key: &TileKey, bytes: &[u8]) -> CacheResult<()> {
        if !self.enabled() {
            return Ok(());
        }
        let epoch = self.current_epoch(&key.table)?;
        self.backend.write(&key.path(epoch)?, bytes)
    }

    /// Store under the epoch captured by `probe`.
    ///
    /// If the table was invalidated in between, the entry lands in a dead
    /// epoch and is never served.
    pub fn fill(&self, pending: PendingTile, bytes: &[u8]) -> CacheResult<()> {
        if !self.enabled() {
            return Ok(());
        }
        self.backend.write(&pending.key.path(pending.epoch)?, bytes)
    }

    /// Drop every entry of `table`; returns the new epoch
    pub fn invalidate_table(&self, table: &TableRef) -> CacheResult<u64> {
        let mut epochs = self.write_epochs()?;
        let current = match epochs.get(table) {
            Some(epoch) => *epoch,
            None => self.load_marker(table)?,
        };

        let next = current + 1;
        self.backend
            .write(&epoch_marker_path(table)?, next.to_string().as_bytes())?;
        epochs.insert(table.clone(), next);
        Ok(next)
    }

    /// Delete the directories of every non-current epoch; returns how many
    pub fn purge_stale(&self, table: &TableRef) -> CacheResult<usize> {
        let current = self.current_epoch(table)?;
        let dir = table_dir(table)?;

        let mut removed = 0;
        for name in self.backend.list(&dir)? {
            match parse_epoch_dir(&name) {
                Some(epoch) if epoch != current => {
                    self.backend.delete_prefix(&format!("{}/{}", dir, name))?;
                    removed += 1;
                }
                _ => {}
            }
        }
        Ok(removed)
    }

    /// Bytes held on disk for `table`, including stale epochs
    pub fn cache_size(&self, table: &TableRef) -> CacheResult<u64> {
        self.backend.size(&table_dir(table)?)
    }

    /// Bytes held by the current epoch only
    pub fn live_size(&self, table: &TableRef) -> CacheResult<u64> {
        let epoch = self.current_epoch(table)?;
        self.backend
            .size(&format!("{}/{}", table_dir(table)?, epoch_dir(epoch)))
    }

    fn read_fresh(&self, path: &str) -> CacheResult<Option<Vec<u8>>> {
        if !self.backend.exists(path)? {
            return Ok(None);
        }

        let modified = match self.backend.modified(path) {
            Ok(modified) => modified,
            Err(CacheError::EntryNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        // Clock skew (mtime in the future) counts as fresh
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > self.max_age {
            return Ok(None);
        }

        match self.backend.read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(CacheError::EntryNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn load_marker(&self, table: &TableRef) -> CacheResult<u64> {
        let path = epoch_marker_path(table)?;
        match self.backend.read(&path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                text.trim()
                    .parse()
                    .map_err(|_| CacheError::CorruptEpoch(path.clone()))
            }
            Err(CacheError::EntryNotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn read_epochs(
        &self,
    ) -> CacheResult<std::sync::RwLockReadGuard<'_, HashMap<TableRef, u64>>> {
        self.epochs
            .read()
            .map_err(|_| CacheError::IoError("epoch map lock poisoned".to_string()))
    }

    fn write_epochs(
        &self,
    ) -> CacheResult<std::sync::RwLockWriteGuard<'_, HashMap<TableRef, u64>>> {
        self.epochs
            .write()
            .map_err(|_| CacheError::IoError("epoch map lock poisoned".to_string()))
    }
}
