//! Tile keys and their on-disk layout
//!
//! ```text
//! <schema>_<table>/EPOCH
//! <schema>_<table>/e<epoch>/<tms>/<zoom>/<row>/<column>
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::TableRef;

use super::errors::{CacheError, CacheResult};

/// Name of the per-table epoch marker file
pub const EPOCH_MARKER: &str = "EPOCH";

/// Identity of one cached tile
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub table: TableRef,
    pub tile_matrix_set: String,
    pub zoom: u32,
    /// First index after the zoom in the request path; x of the envelope
    pub row: u32,
    /// y of the envelope
    pub column: u32,
}

impl TileKey {
    pub fn new(
        table: TableRef,
        tile_matrix_set: impl Into<String>,
        zoom: u32,
        row: u32,
        column: u32,
    ) -> Self {
        Self {
            table,
            tile_matrix_set: tile_matrix_set.into(),
            zoom,
            row,
            column,
        }
    }

    /// Path of this tile within `epoch`
    pub fn path(&self, epoch: u64) -> CacheResult<String> {
        check_segment(&self.tile_matrix_set)?;
        Ok(format!(
            "{}/{}/{}/{}/{}/{}",
            table_dir(&self.table)?,
            epoch_dir(epoch),
            self.tile_matrix_set,
            self.zoom,
            self.row,
            self.column
        ))
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.table, self.tile_matrix_set, self.zoom, self.row, self.column
        )
    }
}

/// Directory holding every epoch of one table
pub fn table_dir(table: &TableRef) -> CacheResult<String> {
    check_segment(&table.schema)?;
    check_segment(&table.name)?;
    Ok(format!("{}_{}", table.schema, table.name))
}

pub fn epoch_dir(epoch: u64) -> String {
    format!("e{}", epoch)
}

/// Inverse of [`epoch_dir`]
pub fn parse_epoch_dir(name: &str) -> Option<u64> {
    name.strip_prefix('e')?.parse().ok()
}

pub fn epoch_marker_path(table: &TableRef) -> CacheResult<String> {
    Ok(format!("{}/{}", table_dir(table)?, EPOCH_MARKER))
}

/// One path segment: no separators, no dot-only names
fn check_segment(segment: &str) -> CacheResult<()> {
    let bad = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0']);
    if bad {
        return Err(CacheError::InvalidPath(segment.to_string()));
    }
    Ok(())
}
