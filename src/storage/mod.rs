//! # Storage
//!
//! Interface to the relational store that executes assembled queries. This
//! crate ships no driver; the embedding application supplies one.

mod errors;
mod executor;

pub use errors::{StorageError, StorageErrorKind, StorageResult};
pub use executor::{ColumnRange, FeatureRow, StorageExecutor};
