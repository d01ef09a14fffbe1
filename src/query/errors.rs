//! # Query Errors
//!
//! Raised while assembling descriptors from request parameters. Like filter
//! errors, all of them surface before storage is touched.

use thiserror::Error;

use crate::filter::FilterError;

/// Result type for query assembly
pub type QueryResult<T> = Result<T, QueryError>;

/// Query assembly errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// Projection, sort or range column absent from the catalog
    #[error("Column: {column} is not a column for {table}")]
    UnknownColumn { column: String, table: String },

    #[error("Invalid bbox: {0}")]
    InvalidBoundingBox(String),

    #[error("Invalid {name}: {detail}")]
    InvalidParameter { name: String, detail: String },

    /// Spatial work requested on a table without a geometry column
    #[error("Table {0} has no geometry column")]
    MissingGeometryColumn(String),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl QueryError {
    pub fn unknown_column(column: impl Into<String>, table: impl ToString) -> Self {
        QueryError::UnknownColumn {
            column: column.into(),
            table: table.to_string(),
        }
    }

    pub fn invalid_parameter(name: impl Into<String>, detail: impl Into<String>) -> Self {
        QueryError::InvalidParameter {
            name: name.into(),
            detail: detail.into(),
        }
    }
}
