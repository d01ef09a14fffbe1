//! CLI-specific error types

use std::fmt;
use std::io;

use crate::catalog::CatalogError;
use crate::classify::ClassifyError;
use crate::config::ConfigError;
use crate::filter::FilterError;
use crate::query::QueryError;
use crate::tile_cache::CacheError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// Catalog file error
    CatalogError,
    /// Filter or request parameters rejected
    InvalidInput,
    /// Tile cache failure
    CacheError,
    /// I/O error (stdout)
    IoError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "GEOQUERY_CLI_CONFIG_ERROR",
            Self::CatalogError => "GEOQUERY_CLI_CATALOG_ERROR",
            Self::InvalidInput => "GEOQUERY_CLI_INVALID_INPUT",
            Self::CacheError => "GEOQUERY_CLI_CACHE_ERROR",
            Self::IoError => "GEOQUERY_CLI_IO_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidInput, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        Self::new(CliErrorCode::CatalogError, e.to_string())
    }
}

impl From<FilterError> for CliError {
    fn from(e: FilterError) -> Self {
        // Syntax errors display generically; the CLI shows where
        Self::invalid_input(e.detail())
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Filter(filter) => filter.into(),
            other => Self::invalid_input(other.to_string()),
        }
    }
}

impl From<ClassifyError> for CliError {
    fn from(e: ClassifyError) -> Self {
        Self::invalid_input(e.to_string())
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        Self::new(CliErrorCode::CacheError, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::config_error("missing file");
        assert_eq!(err.to_string(), "GEOQUERY_CLI_CONFIG_ERROR: missing file");
    }

    #[test]
    fn test_syntax_detail_is_kept() {
        let err: CliError = FilterError::syntax(11, "unexpected 'LI'").into();
        assert_eq!(err.code(), &CliErrorCode::InvalidInput);
        assert!(err.message().contains("offset 11"));
    }
}
