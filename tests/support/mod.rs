//! Shared fixtures: a column catalog of US states and a storage executor
//! that records every statement it is handed.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use geoquery::catalog::{Catalog, ColumnInfo, ColumnKind, MemoryCatalog, SchemaChange, TableRef};
use geoquery::filter::Literal;
use geoquery::query::{
    AggregateQuery, AutocompleteQuery, BoundingBox, BreakpointQuery, ColumnRangeQuery,
    CountDescriptor, DistinctQuery, ExtentQuery, QueryDescriptor, Statement, TileQuery,
    ToStatement,
};
use geoquery::service::{CollectionService, ServiceSettings};
use geoquery::storage::{ColumnRange, FeatureRow, StorageError, StorageExecutor, StorageResult};
use geoquery::tile_cache::{TileCache, TileKey};
use serde_json::{Map, Value};
use tempfile::TempDir;

// =============================================================================
// Catalog Fixtures
// =============================================================================

pub fn states() -> TableRef {
    TableRef::new("public", "states")
}

/// Table without a geometry column
pub fn lookup() -> TableRef {
    TableRef::new("public", "lookup")
}

pub fn states_columns() -> Vec<ColumnInfo> {
    vec![
        ColumnInfo::numeric("gid"),
        ColumnInfo::text("state_name"),
        ColumnInfo::text("state_abbr"),
        ColumnInfo::numeric("population"),
        ColumnInfo::new("is_coastal", ColumnKind::Boolean),
        ColumnInfo::new("admitted", ColumnKind::Temporal),
        ColumnInfo::geometry("geom"),
    ]
}

pub fn states_catalog() -> Catalog {
    Catalog::new(states(), states_columns())
}

pub fn memory_catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog.register(states(), states_columns()).unwrap();
    catalog
        .register(
            lookup(),
            vec![
                ColumnInfo::numeric("gid"),
                ColumnInfo::text("code"),
                ColumnInfo::text("label"),
            ],
        )
        .unwrap();
    catalog
}

pub fn tile_key(zoom: u32, row: u32, column: u32) -> TileKey {
    TileKey::new(states(), "WebMercatorQuad", zoom, row, column)
}

// =============================================================================
// Recording Storage
// =============================================================================

/// Storage executor that renders and records each descriptor.
///
/// Bucket counts are answered from `values`: the last two parameters of a
/// count statement ending in a range test are the bucket bounds.
#[derive(Default)]
pub struct RecordingStorage {
    statements: Mutex<Vec<Statement>>,
    tile_calls: AtomicUsize,
    pub features: Vec<FeatureRow>,
    pub matched: u64,
    pub values: Vec<f64>,
    pub breakpoints: Vec<f64>,
    pub tile: Vec<u8>,
    /// Row returned for aggregate statements
    pub aggregates: Map<String, Value>,
    /// Rows returned for every distinct-group statement
    pub groups: Vec<Map<String, Value>>,
    /// Values returned for autocomplete statements
    pub suggestions: Vec<Value>,
    pub extent: Option<BoundingBox>,
    pub failure: Option<StorageError>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_features(mut self, features: Vec<FeatureRow>, matched: u64) -> Self {
        self.features = features;
        self.matched = matched;
        self
    }

    pub fn with_values(mut self, values: Vec<f64>) -> Self {
        self.values = values;
        self
    }

    pub fn with_breakpoints(mut self, breakpoints: Vec<f64>) -> Self {
        self.breakpoints = breakpoints;
        self
    }

    pub fn with_tile(mut self, tile: &[u8]) -> Self {
        self.tile = tile.to_vec();
        self
    }

    pub fn with_aggregates(mut self, row: Value) -> Self {
        if let Value::Object(map) = row {
            self.aggregates = map;
        }
        self
    }

    pub fn with_groups(mut self, rows: Vec<Value>) -> Self {
        self.groups = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self
    }

    pub fn with_suggestions(mut self, values: Vec<Value>) -> Self {
        self.suggestions = values;
        self
    }

    pub fn with_extent(mut self, extent: BoundingBox) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn failing(mut self, error: StorageError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn tile_calls(&self) -> usize {
        self.tile_calls.load(Ordering::SeqCst)
    }

    fn record(&self, statement: Statement) -> StorageResult<Statement> {
        self.statements.lock().unwrap().push(statement.clone());
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(statement),
        }
    }

    fn bucket_count(&self, statement: &Statement) -> Option<u64> {
        let params = &statement.parameters;
        let text = statement.text.trim_end_matches(')');
        if params.len() < 2 || !text.ends_with(&format!("<= ${}", params.len())) {
            return None;
        }
        let (min, max) = match (&params[params.len() - 2], &params[params.len() - 1]) {
            (Literal::Float(min), Literal::Float(max)) => (*min, *max),
            _ => return None,
        };
        let lower_inclusive = statement
            .text
            .contains(&format!(">= ${}", params.len() - 1));

        let count = self
            .values
            .iter()
            .filter(|v| {
                let above = if lower_inclusive { **v >= min } else { **v > min };
                above && **v <= max
            })
            .count();
        Some(count as u64)
    }
}

impl StorageExecutor for RecordingStorage {
    fn fetch_features(&self, query: &QueryDescriptor) -> StorageResult<Vec<FeatureRow>> {
        self.record(query.to_statement())?;
        Ok(self.features.clone())
    }

    fn count(&self, count: &CountDescriptor) -> StorageResult<u64> {
        let statement = self.record(count.to_statement())?;
        Ok(self.bucket_count(&statement).unwrap_or(self.matched))
    }

    fn fetch_tile(&self, tile: &TileQuery) -> StorageResult<Vec<u8>> {
        self.record(tile.to_statement())?;
        self.tile_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tile.clone())
    }

    fn column_range(&self, range: &ColumnRangeQuery) -> StorageResult<Option<ColumnRange>> {
        self.record(range.to_statement())?;
        let min = self.values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if self.values.is_empty() {
            Ok(None)
        } else {
            Ok(Some(ColumnRange { min, max }))
        }
    }

    fn breakpoints(&self, query: &BreakpointQuery) -> StorageResult<Vec<f64>> {
        self.record(query.to_statement())?;
        Ok(self.breakpoints.clone())
    }

    fn aggregate(&self, query: &AggregateQuery) -> StorageResult<Map<String, Value>> {
        self.record(query.to_statement())?;
        Ok(self.aggregates.clone())
    }

    fn distinct_groups(&self, query: &DistinctQuery) -> StorageResult<Vec<Map<String, Value>>> {
        self.record(query.to_statement())?;
        Ok(self.groups.clone())
    }

    fn distinct_values(&self, query: &AutocompleteQuery) -> StorageResult<Vec<Value>> {
        self.record(query.to_statement())?;
        Ok(self.suggestions.clone())
    }

    fn extent(&self, query: &ExtentQuery) -> StorageResult<Option<BoundingBox>> {
        self.record(query.to_statement())?;
        Ok(self.extent)
    }

    fn alter_table(&self, change: &SchemaChange) -> StorageResult<()> {
        self.record(change.to_statement())?;
        Ok(())
    }
}

// =============================================================================
// Service Fixtures
// =============================================================================

pub fn service_with(
    storage: Arc<RecordingStorage>,
    cache_dir: &TempDir,
    max_age_secs: u64,
) -> CollectionService {
    let cache = TileCache::local(cache_dir.path(), Duration::from_secs(max_age_secs));
    CollectionService::new(
        ServiceSettings::default(),
        Arc::new(memory_catalog()),
        storage,
        Arc::new(cache),
    )
}
