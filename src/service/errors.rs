//! # Service Errors
//!
//! Request-level taxonomy. Every lower-level error is folded into one of
//! these before it reaches a transport.

use axum::http::StatusCode;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::classify::ClassifyError;
use crate::filter::FilterError;
use crate::query::QueryError;
use crate::storage::StorageError;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Malformed filter; `detail` is for logs only
    #[error("Invalid operator used in filter")]
    Syntax { detail: String },

    #[error("Column: {column} is not a column for {table}")]
    UnknownColumn { column: String, table: String },

    #[error("{0}")]
    TypeMismatch(String),

    #[error("{0}")]
    InvalidParameter(String),

    /// Storage rejected the statement; message is the collaborator's
    #[error("{0}")]
    Storage(StorageError),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Item {id} not found in {table}")]
    ItemNotFound { table: String, id: String },

    // ==================
    // Server Errors (5xx)
    // ==================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Syntax { .. }
            | ServiceError::UnknownColumn { .. }
            | ServiceError::TypeMismatch(_)
            | ServiceError::InvalidParameter(_)
            | ServiceError::Storage(_) => StatusCode::BAD_REQUEST,

            ServiceError::TableNotFound(_) | ServiceError::ItemNotFound { .. } => {
                StatusCode::NOT_FOUND
            }

            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Raised by the filter or the assembler, before storage was touched
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ServiceError::Syntax { .. }
                | ServiceError::UnknownColumn { .. }
                | ServiceError::TypeMismatch(_)
                | ServiceError::InvalidParameter(_)
        )
    }

    /// Message for logs; more specific than `Display` for syntax errors
    pub fn detail(&self) -> String {
        match self {
            ServiceError::Syntax { detail } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<FilterError> for ServiceError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::Syntax { .. } => ServiceError::Syntax {
                detail: err.detail(),
            },
            FilterError::UnknownColumn { column, table } => {
                ServiceError::UnknownColumn { column, table }
            }
            FilterError::TypeMismatch { .. } => ServiceError::TypeMismatch(err.to_string()),
        }
    }
}

impl From<QueryError> for ServiceError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Filter(filter) => filter.into(),
            QueryError::UnknownColumn { column, table } => {
                ServiceError::UnknownColumn { column, table }
            }
            other => ServiceError::InvalidParameter(other.to_string()),
        }
    }
}

impl From<CatalogError> for ServiceError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::TableNotFound(table) => ServiceError::TableNotFound(table),
            CatalogError::InvalidTable(_) => ServiceError::InvalidParameter(err.to_string()),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Storage(err)
    }
}

impl From<ClassifyError> for ServiceError {
    fn from(err: ClassifyError) -> Self {
        ServiceError::InvalidParameter(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnKind;

    #[test]
    fn test_status_codes() {
        let syntax: ServiceError = FilterError::syntax(3, "unknown operator LI").into();
        assert_eq!(syntax.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(syntax.to_string(), "Invalid operator used in filter");
        assert!(syntax.detail().contains("LI"));

        let storage: ServiceError = StorageError::other("connection reset").into();
        assert_eq!(storage.status_code(), StatusCode::BAD_REQUEST);

        let missing: ServiceError = CatalogError::TableNotFound("public.nope".into()).into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let item = ServiceError::ItemNotFound {
            table: "public.states".into(),
            id: "99".into(),
        };
        assert_eq!(item.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(item.to_string(), "Item 99 not found in public.states");

        let internal: ServiceError = CatalogError::Unavailable("down".into()).into();
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_query_error_mapping() {
        let err: ServiceError = QueryError::unknown_column("state_names", "public.states").into();
        assert!(matches!(
            err,
            ServiceError::UnknownColumn { ref column, .. } if column == "state_names"
        ));

        let err: ServiceError = QueryError::Filter(FilterError::TypeMismatch {
            column: "state_name".into(),
            expected: "numeric",
            found: ColumnKind::Text,
        })
        .into();
        assert!(matches!(err, ServiceError::TypeMismatch(_)));
        assert!(err.is_rejection());

        let err: ServiceError = QueryError::InvalidBoundingBox("1,2,3".into()).into();
        assert!(matches!(err, ServiceError::InvalidParameter(_)));
    }

    #[test]
    fn test_storage_message_is_verbatim() {
        let err: ServiceError = StorageError::undefined_column("column \"pop\" does not exist").into();
        assert_eq!(err.to_string(), "column \"pop\" does not exist");
        assert!(!err.is_rejection());
    }
}
