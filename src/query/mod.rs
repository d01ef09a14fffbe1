//! # Query Assembly
//!
//! Request parameters → validated descriptors → parameterized statements.
//!
//! The assembler owns no state beyond a catalog snapshot and settings. It
//! never executes anything: descriptors are handed to a storage executor,
//! which may render them with [`ToStatement`].

mod assembler;
mod bbox;
mod descriptor;
mod errors;
mod params;
mod sql;

pub use assembler::{
    assemble, assemble_tile, QueryAssembler, DEFAULT_MAX_FEATURES, DEFAULT_SURROGATE_KEY,
    MAX_STATISTICS,
};
pub use bbox::BoundingBox;
pub use descriptor::{
    Aggregate, AggregateFunction, AggregateQuery, AssembledQuery, AutocompleteQuery,
    BreakpointQuery, ColumnRangeQuery, CountDescriptor, DistinctQuery, ExtentQuery, GeometryOutput,
    NearestTo, OrderBy, Pagination, QueryDescriptor, SortDirection, StatisticsQuery, TileQuery,
    DEFAULT_LIMIT, DEFAULT_OUTPUT_SRID,
};
pub use errors::{QueryError, QueryResult};
pub use params::{
    ClosestRequest, ItemRequest, ItemsRequest, StatisticColumn, StatisticType, StatisticsRequest,
    RESERVED_PARAMS,
};
pub use sql::{Statement, ToStatement, TILE_EXTENT, TILE_SRID};
