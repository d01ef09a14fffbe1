//! Observable events

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    ConfigLoaded,
    Serving,
    ShutdownComplete,

    // Query assembly
    QueryAssembled,
    FilterRejected,

    // Storage
    StorageFailed,

    // Tile cache
    TileCacheHit,
    TileCacheMiss,
    TileCacheStored,
    /// Cache I/O failed; the request fell through to storage
    TileCacheError,
    TableInvalidated,
    CachePurged,

    // Schema
    SchemaChanged,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::Serving => "GEOQUERY_SERVING",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
            Event::QueryAssembled => "QUERY_ASSEMBLED",
            Event::FilterRejected => "FILTER_REJECTED",
            Event::StorageFailed => "STORAGE_FAILED",
            Event::TileCacheHit => "TILE_CACHE_HIT",
            Event::TileCacheMiss => "TILE_CACHE_MISS",
            Event::TileCacheStored => "TILE_CACHE_STORED",
            Event::TileCacheError => "TILE_CACHE_ERROR",
            Event::TableInvalidated => "TABLE_INVALIDATED",
            Event::CachePurged => "CACHE_PURGED",
            Event::SchemaChanged => "SCHEMA_CHANGED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Event::TileCacheHit | Event::TileCacheMiss | Event::QueryAssembled => Severity::Trace,
            Event::FilterRejected | Event::TileCacheError => Severity::Warn,
            Event::StorageFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_upper_snake() {
        let events = [
            Event::ConfigLoaded,
            Event::Serving,
            Event::ShutdownComplete,
            Event::QueryAssembled,
            Event::FilterRejected,
            Event::StorageFailed,
            Event::TileCacheHit,
            Event::TileCacheMiss,
            Event::TileCacheStored,
            Event::TileCacheError,
            Event::TableInvalidated,
            Event::CachePurged,
            Event::SchemaChanged,
        ];
        for event in events {
            assert!(event.as_str().chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_cache_errors_warn() {
        assert_eq!(Event::TileCacheError.severity(), Severity::Warn);
        assert_eq!(Event::StorageFailed.severity(), Severity::Error);
    }
}
