//! # Filter Errors
//!
//! Errors raised while parsing or compiling a filter expression. All of them
//! are raised before any query reaches storage.

use thiserror::Error;

use crate::catalog::ColumnKind;

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;

/// Filter parse/compile errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// Filter text does not match the grammar.
    ///
    /// Displayed generically; `detail` is kept for logs.
    #[error("Invalid operator used in filter")]
    Syntax { position: usize, detail: String },

    /// A column reference absent from the catalog
    #[error("Column: {column} is not a column for {table}")]
    UnknownColumn { column: String, table: String },

    /// A predicate incompatible with the column's type
    #[error("Column: {column} is {found}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: ColumnKind,
    },
}

impl FilterError {
    pub fn syntax(position: usize, detail: impl Into<String>) -> Self {
        FilterError::Syntax {
            position,
            detail: detail.into(),
        }
    }

    pub fn unknown_column(column: impl Into<String>, table: impl ToString) -> Self {
        FilterError::UnknownColumn {
            column: column.into(),
            table: table.to_string(),
        }
    }

    /// Detailed description for logging
    pub fn detail(&self) -> String {
        match self {
            FilterError::Syntax { position, detail } => {
                format!("{} at offset {}", detail, position)
            }
            other => other.to_string(),
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, FilterError::Syntax { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_display_is_generic() {
        let err = FilterError::syntax(10, "unexpected token 'LI'");
        assert_eq!(err.to_string(), "Invalid operator used in filter");
        assert!(err.detail().contains("LI"));
        assert!(err.detail().contains("10"));
    }

    #[test]
    fn test_unknown_column_display() {
        let err = FilterError::unknown_column("state_names", "public.states");
        assert_eq!(
            err.to_string(),
            "Column: state_names is not a column for public.states"
        );
    }
}
