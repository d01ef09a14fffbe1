//! # Classification Errors

use thiserror::Error;

/// Result type for classification
pub type ClassifyResult<T> = Result<T, ClassifyError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifyError {
    #[error("Number of bins must be at least 1")]
    InvalidBinCount,

    #[error("Number of bins must be at most {max}, got {requested}")]
    TooManyBuckets { requested: usize, max: usize },

    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("Unknown break method: {0}")]
    UnknownMethod(String),
}
