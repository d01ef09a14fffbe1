//! # Storage Executor Trait
//!
//! Executes descriptors against the relational store. Implementations are
//! blocking; the service calls them from the tokio blocking pool. Each
//! descriptor implements [`ToStatement`](crate::query::ToStatement), so an
//! executor backed by a SQL driver only needs to run the rendered text with
//! its parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::SchemaChange;
use crate::query::{
    AggregateQuery, AutocompleteQuery, BoundingBox, BreakpointQuery, ColumnRangeQuery,
    CountDescriptor, DistinctQuery, ExtentQuery, QueryDescriptor, TileQuery,
};

use super::errors::StorageResult;

/// One row of a feature page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Surrogate key value
    pub id: Value,
    pub properties: Map<String, Value>,
    /// GeoJSON geometry, when requested
    pub geometry: Option<Value>,
}

impl FeatureRow {
    pub fn new(id: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            properties: Map::new(),
            geometry: None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_geometry(mut self, geometry: Value) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// GeoJSON Feature object
    pub fn into_feature(self) -> Value {
        serde_json::json!({
            "type": "Feature",
            "id": self.id,
            "properties": Value::Object(self.properties),
            "geometry": self.geometry.unwrap_or(Value::Null),
        })
    }
}

/// Observed minimum and maximum of a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub min: f64,
    pub max: f64,
}

/// Blocking executor for assembled descriptors
pub trait StorageExecutor: Send + Sync {
    /// One page of features
    fn fetch_features(&self, query: &QueryDescriptor) -> StorageResult<Vec<FeatureRow>>;

    fn count(&self, count: &CountDescriptor) -> StorageResult<u64>;

    /// Encoded vector tile; empty when no feature intersects the tile
    fn fetch_tile(&self, tile: &TileQuery) -> StorageResult<Vec<u8>>;

    /// `None` when no row matches
    fn column_range(&self, range: &ColumnRangeQuery) -> StorageResult<Option<ColumnRange>>;

    /// Breakpoints returned by the storage-side classification function
    fn breakpoints(&self, query: &BreakpointQuery) -> StorageResult<Vec<f64>>;

    /// The single result row, keyed by aggregate alias
    fn aggregate(&self, query: &AggregateQuery) -> StorageResult<Map<String, Value>>;

    /// One row per distinct value, keyed by column name and method
    fn distinct_groups(&self, query: &DistinctQuery) -> StorageResult<Vec<Map<String, Value>>>;

    fn distinct_values(&self, query: &AutocompleteQuery) -> StorageResult<Vec<Value>>;

    /// `None` for a table without geometries
    fn extent(&self, query: &ExtentQuery) -> StorageResult<Option<BoundingBox>>;

    /// Apply a column addition or removal
    fn alter_table(&self, change: &SchemaChange) -> StorageResult<()>;
}
