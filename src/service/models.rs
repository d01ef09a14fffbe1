//! Request and response models for collection operations

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::{ColumnInfo, ColumnType};
use crate::classify::{BreakMethod, ClassificationBreak};
use crate::query::BoundingBox;
use crate::storage::FeatureRow;

fn default_bins() -> u32 {
    10
}

/// Equal-interval bins over a numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinsRequest {
    pub column: String,
    #[serde(default = "default_bins")]
    pub number_of_bins: u32,
    #[serde(default, alias = "cql_filter")]
    pub filter: Option<String>,
}

/// Breaks chosen by a classification method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericBreaksRequest {
    pub column: String,
    pub number_of_breaks: u32,
    pub break_type: BreakMethod,
    #[serde(default, alias = "cql_filter")]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinRange {
    pub min: f64,
    pub max: f64,
}

/// Caller-supplied ranges to count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomBreaksRequest {
    pub column: String,
    pub breaks: Vec<BinRange>,
    #[serde(default, alias = "cql_filter")]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreaksResponse {
    pub results: Vec<ClassificationBreak>,
}

/// One page of features plus the unpaginated match count
#[derive(Debug, Clone, PartialEq)]
pub struct ItemsPage {
    pub features: Vec<FeatureRow>,
    pub number_matched: u64,
    pub limit: u64,
    pub offset: u64,
}

impl ItemsPage {
    pub fn number_returned(&self) -> usize {
        self.features.len()
    }

    /// Offset of the following page, if any rows remain
    pub fn next_offset(&self) -> Option<u64> {
        let next = self.offset + self.number_returned() as u64;
        (next < self.number_matched && self.number_returned() > 0).then_some(next)
    }

    pub fn prev_offset(&self) -> Option<u64> {
        (self.offset > 0).then(|| self.offset.saturating_sub(self.limit))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TilePayload {
    Content(Vec<u8>),
    /// No feature intersects the tile
    NoContent,
}

impl TilePayload {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            TilePayload::NoContent
        } else {
            TilePayload::Content(bytes)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileResponse {
    pub payload: TilePayload,
    pub from_cache: bool,
    /// Seconds a client may cache this response
    pub max_age: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheSize {
    pub size_in_bytes: u64,
    pub size_in_gigabytes: f64,
}

impl CacheSize {
    pub fn from_bytes(bytes: u64) -> Self {
        Self {
            size_in_bytes: bytes,
            size_in_gigabytes: bytes as f64 / 1_000_000_000.0,
        }
    }
}

/// Results keyed `{type}_{column}`, or
/// `distinct_{column}_{group_method}_{group_column}` for distinct groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsResponse {
    pub results: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteResponse {
    pub values: Vec<Value>,
}

/// What a tile client needs to know about a collection
#[derive(Debug, Clone, PartialEq)]
pub struct TileMetadata {
    /// `schema.table`, also the tile layer name
    pub name: String,
    /// WGS84; `None` when the table holds no geometry
    pub bounds: Option<BoundingBox>,
    pub fields: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddColumnRequest {
    pub column_name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeOutcome {
    /// Epoch in effect after the purge
    pub epoch: u64,
    /// Epoch directories removed
    pub removed: usize,
}
