//! Query descriptors
//!
//! Fully validated, storage-ready descriptions of the statements a request
//! needs. Descriptors are per request and never mutated after assembly.

use serde::{Deserialize, Serialize};

use crate::catalog::TableRef;
use crate::classify::BreakMethod;
use crate::filter::Predicate;
use crate::tile_cache::TileKey;

/// Default page size
pub const DEFAULT_LIMIT: u64 = 10;

/// Default output SRID for feature geometries
pub const DEFAULT_OUTPUT_SRID: u32 = 4326;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Legacy `sortdesc` flag: `1` sorts ascending, anything else descending
    pub fn from_sortdesc(flag: i64) -> Self {
        if flag == 1 {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        }
    }
}

/// Single-column ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u64,
    pub offset: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Geometry column returned with each feature, transformed to `srid`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryOutput {
    pub column: String,
    pub srid: u32,
}

/// Point that features are ranked by distance from
#[derive(Debug, Clone, PartialEq)]
pub struct NearestTo {
    pub geometry_column: String,
    /// SRID of stored geometries; the point is transformed into it
    pub storage_srid: u32,
    /// WGS84
    pub longitude: f64,
    pub latitude: f64,
}

/// Feature page query
#[derive(Debug, Clone)]
pub struct QueryDescriptor {
    pub table: TableRef,
    /// Property columns, a subset of the catalog
    pub columns: Vec<String>,
    /// Surrogate key, always selected
    pub id_column: String,
    pub geometry: Option<GeometryOutput>,
    pub predicate: Option<Predicate>,
    /// Nearest-first ordering ahead of `order_by`, plus a
    /// `distance_in_kilometers` property
    pub nearest: Option<NearestTo>,
    pub order_by: OrderBy,
    pub pagination: Pagination,
}

/// Total-match count for the same predicate, without paging or ordering
#[derive(Debug, Clone)]
pub struct CountDescriptor {
    pub table: TableRef,
    pub predicate: Option<Predicate>,
}

/// Page query and its independent count
#[derive(Debug, Clone)]
pub struct AssembledQuery {
    pub query: QueryDescriptor,
    pub count: CountDescriptor,
}

/// Vector tile query
#[derive(Debug, Clone)]
pub struct TileQuery {
    pub key: TileKey,
    pub geometry_column: String,
    pub properties: Vec<String>,
    /// Filter predicate, conjoined after the tile envelope test
    pub predicate: Option<Predicate>,
    pub max_features: u32,
    pub layer_name: String,
}

/// `MIN`/`MAX` of one numeric column
#[derive(Debug, Clone)]
pub struct ColumnRangeQuery {
    pub table: TableRef,
    pub column: String,
    pub predicate: Option<Predicate>,
}

/// Breakpoints computed inside storage by a classification function
#[derive(Debug, Clone)]
pub struct BreakpointQuery {
    pub table: TableRef,
    pub column: String,
    pub method: BreakMethod,
    pub breaks: u32,
    pub predicate: Option<Predicate>,
}

/// Aggregate functions usable in statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Avg,
    Count,
    Sum,
    Max,
    Min,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Avg => "avg",
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Max => "max",
            AggregateFunction::Min => "min",
        }
    }

    /// `avg` and `sum` only apply to numeric columns
    pub fn requires_numeric(&self) -> bool {
        matches!(self, AggregateFunction::Avg | AggregateFunction::Sum)
    }
}

/// One aggregate over one column, reported as `{function}_{column}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub column: String,
}

impl Aggregate {
    pub fn alias(&self) -> String {
        format!("{}_{}", self.function.as_str(), self.column)
    }
}

/// Single-row aggregates over the filtered table
#[derive(Debug, Clone)]
pub struct AggregateQuery {
    pub table: TableRef,
    pub aggregates: Vec<Aggregate>,
    pub predicate: Option<Predicate>,
}

/// Distinct values of `column` with one aggregate of `group_column` each,
/// largest aggregate first
#[derive(Debug, Clone)]
pub struct DistinctQuery {
    pub table: TableRef,
    pub column: String,
    pub group_column: String,
    pub group_method: AggregateFunction,
    pub predicate: Option<Predicate>,
}

impl DistinctQuery {
    /// Result key, `distinct_{column}_{method}_{group_column}`
    pub fn alias(&self) -> String {
        format!(
            "distinct_{}_{}_{}",
            self.column,
            self.group_method.as_str(),
            self.group_column
        )
    }
}

/// Every statement one statistics request needs
#[derive(Debug, Clone)]
pub struct StatisticsQuery {
    /// `None` when the request only asks for distinct groups
    pub aggregates: Option<AggregateQuery>,
    pub distinct: Vec<DistinctQuery>,
}

/// Distinct values of a text column containing `pattern`
#[derive(Debug, Clone)]
pub struct AutocompleteQuery {
    pub table: TableRef,
    pub column: String,
    /// `ILIKE` pattern, metacharacters of the search text escaped
    pub pattern: String,
    pub limit: u64,
}

/// Bounds of every geometry in a table, in WGS84
#[derive(Debug, Clone)]
pub struct ExtentQuery {
    pub table: TableRef,
    pub geometry_column: String,
}
