//! Storage errors
//!
//! The collaborator's message is carried verbatim; the kind only drives
//! status mapping and metrics.

use std::fmt;

/// Classes of storage failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// A column referenced by the statement does not exist
    UndefinedColumn,
    UndefinedTable,
    /// A bound value was rejected by the column's type
    InvalidLiteral,
    Other,
}

impl StorageErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorKind::UndefinedColumn => "STORAGE_UNDEFINED_COLUMN",
            StorageErrorKind::UndefinedTable => "STORAGE_UNDEFINED_TABLE",
            StorageErrorKind::InvalidLiteral => "STORAGE_INVALID_LITERAL",
            StorageErrorKind::Other => "STORAGE_FAILED",
        }
    }
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Failure reported by a storage executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    kind: StorageErrorKind,
    message: String,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn undefined_column(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::UndefinedColumn, message)
    }

    pub fn undefined_table(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::UndefinedTable, message)
    }

    pub fn invalid_literal(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::InvalidLiteral, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Other, message)
    }

    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StorageError {}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_verbatim() {
        let err = StorageError::undefined_column("column \"pop\" does not exist");
        assert_eq!(err.to_string(), "column \"pop\" does not exist");
        assert_eq!(err.kind().code(), "STORAGE_UNDEFINED_COLUMN");
        assert_eq!(
            StorageError::invalid_literal("invalid input syntax for type integer: \"low\"")
                .kind(),
            StorageErrorKind::InvalidLiteral
        );
    }
}
