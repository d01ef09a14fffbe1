//! # HTTP Server Module
//!
//! Axum transport over [`CollectionService`](crate::service::CollectionService).
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/metrics` - Counter snapshot
//! - `/api/v1/collections/{schema.table}/*` - Items, queryables, tiles, breaks

mod collections_routes;
mod config;
mod errors;
mod server;

pub use collections_routes::{collections_routes, CollectionsState, TileParams, MVT_CONTENT_TYPE};
pub use config::HttpServerConfig;
pub use errors::ErrorResponse;
pub use server::{build_router, HealthResponse, HttpServer, COLLECTIONS_PREFIX};
