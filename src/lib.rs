//! geoquery - filter compilation, query assembly and tile caching for
//! tabular geospatial collections
//!
//! A textual filter is parsed and compiled against a column catalog into a
//! parameterized predicate, merged with bounding box, column equality, sort
//! and pagination parameters into query descriptors, and rendered as
//! PostgreSQL/PostGIS statements for a storage collaborator. Encoded vector
//! tiles are memoized in an epoch-versioned cache kept coherent with table
//! mutations.

pub mod catalog;
pub mod classify;
pub mod cli;
pub mod config;
pub mod filter;
pub mod http_server;
pub mod observability;
pub mod query;
pub mod service;
pub mod storage;
pub mod tile_cache;
