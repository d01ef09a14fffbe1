//! # Column Catalog
//!
//! Table identities and column type tags supplied by the storage
//! collaborator. The core consumes catalogs, it never discovers them.

mod errors;
mod memory;
mod schema;
mod types;

pub use errors::{CatalogError, CatalogResult};
pub use memory::{CatalogFile, CatalogFileColumn, CatalogFileTable, MemoryCatalog};
pub use schema::{ColumnType, SchemaChange};
pub use types::{
    quote_ident, Catalog, ColumnCatalog, ColumnInfo, ColumnKind, TableRef, NUMERIC_DATA_TYPES,
};
