//! # Tile Cache
//!
//! One encoded tile per (table, tiling scheme, zoom, row, column), kept
//! coherent with table mutations through per-table epochs.
//!
//! Cache failures are never fatal to a request; callers log them and fall
//! through to storage.

mod backend;
mod cache;
mod cacheability;
mod errors;
mod key;
mod local;

pub use backend::CacheBackend;
pub use cache::{PendingTile, Probe, TileCache};
pub use cacheability::CachePolicy;
pub use errors::{CacheError, CacheResult};
pub use key::{epoch_dir, parse_epoch_dir, table_dir, TileKey, EPOCH_MARKER};
pub use local::LocalBackend;
