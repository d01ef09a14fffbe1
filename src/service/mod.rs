//! # Collection Service
//!
//! Transport-independent collection operations. The HTTP layer and tests
//! drive the same [`CollectionService`].

mod collections;
mod errors;
mod models;

pub use collections::{CollectionService, ServiceSettings};
pub use errors::{ServiceError, ServiceResult};
pub use models::{
    AddColumnRequest, AutocompleteResponse, BinRange, BinsRequest, BreaksResponse, CacheSize,
    CustomBreaksRequest, ItemsPage, NumericBreaksRequest, PurgeOutcome, StatisticsResponse,
    TileMetadata, TilePayload, TileResponse,
};
