//! # Catalog Errors

use thiserror::Error;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Column catalog errors
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// The table is unknown to the storage collaborator
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Malformed `schema.table` identity
    #[error("Invalid table identity: {0}")]
    InvalidTable(String),

    /// Catalog file could not be loaded
    #[error("Catalog load failed: {0}")]
    LoadFailed(String),

    /// Catalog backend failure
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}
