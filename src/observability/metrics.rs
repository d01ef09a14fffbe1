//! Counters
//!
//! Monotonic, reset only on process start. Relaxed atomics: counts are exact
//! once all writers finish, ordering between counters is not guaranteed.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    queries_assembled: AtomicU64,
    filters_rejected: AtomicU64,
    tile_cache_hits: AtomicU64,
    tile_cache_misses: AtomicU64,
    tile_cache_stores: AtomicU64,
    invalidations: AtomicU64,
    schema_changes: AtomicU64,
    epochs_purged: AtomicU64,
    cache_io_errors: AtomicU64,
    storage_errors: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_queries_assembled(&self) {
        self.queries_assembled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_filters_rejected(&self) {
        self.filters_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_hits(&self) {
        self.tile_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_misses(&self) {
        self.tile_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_stores(&self) {
        self.tile_cache_stores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_invalidations(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_schema_changes(&self) {
        self.schema_changes.fetch_add(1, Ordering::Relaxed);
    }

    /// Dead epoch directories deleted from the tile cache
    pub fn add_epochs_purged(&self, count: u64) {
        self.epochs_purged.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_cache_io_errors(&self) {
        self.cache_io_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_storage_errors(&self) {
        self.storage_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_assembled: self.queries_assembled.load(Ordering::Relaxed),
            filters_rejected: self.filters_rejected.load(Ordering::Relaxed),
            tile_cache_hits: self.tile_cache_hits.load(Ordering::Relaxed),
            tile_cache_misses: self.tile_cache_misses.load(Ordering::Relaxed),
            tile_cache_stores: self.tile_cache_stores.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            schema_changes: self.schema_changes.load(Ordering::Relaxed),
            epochs_purged: self.epochs_purged.load(Ordering::Relaxed),
            cache_io_errors: self.cache_io_errors.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_assembled: u64,
    pub filters_rejected: u64,
    pub tile_cache_hits: u64,
    pub tile_cache_misses: u64,
    pub tile_cache_stores: u64,
    pub invalidations: u64,
    pub schema_changes: u64,
    pub epochs_purged: u64,
    pub cache_io_errors: u64,
    pub storage_errors: u64,
}
