//! Collections HTTP Routes
//!
//! Feature pages and single features, queryables, vector tiles and their
//! metadata, tile cache administration, classification breaks, statistics,
//! autocomplete and column changes for one `schema.table` collection.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::catalog::{ColumnKind, TableRef};
use crate::query::{ClosestRequest, ItemRequest, ItemsRequest, StatisticsRequest};
use crate::service::{
    AddColumnRequest, AutocompleteResponse, BinsRequest, BreaksResponse, CacheSize,
    CollectionService, CustomBreaksRequest, ItemsPage, NumericBreaksRequest, ServiceError,
    ServiceResult, StatisticsResponse, TileMetadata, TilePayload,
};
use crate::storage::FeatureRow;
use crate::tile_cache::TileKey;

pub const MVT_CONTENT_TYPE: &str = "application/vnd.mapbox-vector-tile";

/// Zoom range advertised in tile metadata
pub const MIN_ZOOM: u32 = 0;
pub const MAX_ZOOM: u32 = 22;

/// Suggestions returned when `limit` is absent
pub const DEFAULT_AUTOCOMPLETE_LIMIT: u64 = 10;

// =============================================================================
// Shared State
// =============================================================================

pub struct CollectionsState {
    pub service: CollectionService,
}

impl CollectionsState {
    pub fn new(service: CollectionService) -> Self {
        Self { service }
    }
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct TileParams {
    pub fields: Option<String>,
    #[serde(alias = "cql_filter")]
    pub filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AutocompleteParams {
    pub limit: Option<u64>,
}

// =============================================================================
// Router
// =============================================================================

pub fn collections_routes(state: Arc<CollectionsState>) -> Router {
    Router::new()
        .route("/:collection/items", get(items_get).post(items_post))
        .route("/:collection/items/:id", get(item))
        .route("/:collection/closest_features", get(closest_features))
        .route("/:collection/queryables", get(queryables))
        .route("/:collection/tiles/cache_size", get(cache_size))
        .route("/:collection/tiles/cache", delete(delete_cache))
        .route(
            "/:collection/tiles/:tile_matrix_set/metadata",
            get(tiles_metadata),
        )
        .route(
            "/:collection/tiles/:tile_matrix_set/:zoom/:row/:col",
            get(tile),
        )
        .route("/:collection/bins", post(bins))
        .route("/:collection/numeric_breaks", post(numeric_breaks))
        .route("/:collection/custom_break_values", post(custom_break_values))
        .route("/:collection/statistics", post(statistics))
        .route("/:collection/autocomplete/:column/:q", get(autocomplete))
        .route("/:collection/add_column", post(add_column))
        .route("/:collection/column/:column", delete(drop_column))
        .with_state(state)
}

fn table_ref(collection: &str) -> ServiceResult<TableRef> {
    Ok(collection.parse::<TableRef>()?)
}

// =============================================================================
// Handlers
// =============================================================================

async fn items_get(
    State(state): State<Arc<CollectionsState>>,
    Path(collection): Path<String>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ServiceError> {
    let table = table_ref(&collection)?;
    let request = ItemsRequest::parse(&params)?;
    let page = state.service.items(table, request).await?;
    Ok(Json(feature_collection(page, uri.path(), uri.query())))
}

async fn items_post(
    State(state): State<Arc<CollectionsState>>,
    Path(collection): Path<String>,
    OriginalUri(uri): OriginalUri,
    Json(request): Json<ItemsRequest>,
) -> Result<Json<Value>, ServiceError> {
    let table = table_ref(&collection)?;
    let page = state.service.items(table, request).await?;
    Ok(Json(feature_collection(page, uri.path(), None)))
}

async fn item(
    State(state): State<Arc<CollectionsState>>,
    Path((collection, id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ServiceError> {
    let table = table_ref(&collection)?;
    let request = ItemRequest::parse(&params)?;
    let row = state.service.item(table, id, request).await?;
    Ok(Json(single_feature(row, uri.path())))
}

async fn closest_features(
    State(state): State<Arc<CollectionsState>>,
    Path(collection): Path<String>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ServiceError> {
    let table = table_ref(&collection)?;
    let request = ClosestRequest::parse(&params)?;
    let page = state.service.closest(table, request).await?;
    Ok(Json(feature_collection(page, uri.path(), uri.query())))
}

async fn queryables(
    State(state): State<Arc<CollectionsState>>,
    Path(collection): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Value>, ServiceError> {
    let table = table_ref(&collection)?;
    let columns = state.service.queryables(table).await?;

    let mut properties = Map::new();
    for column in columns {
        let kind = match column.kind {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Boolean => "boolean",
            _ => "string",
        };
        properties.insert(
            column.name.clone(),
            json!({ "title": column.name, "type": kind }),
        );
    }

    Ok(Json(json!({
        "$id": uri.path(),
        "title": collection,
        "type": "object",
        "$schema": "http://json-schema.org/draft/2019-09/schema",
        "properties": properties,
    })))
}

async fn tile(
    State(state): State<Arc<CollectionsState>>,
    Path((collection, tile_matrix_set, zoom, row, col)): Path<(String, String, u32, u32, u32)>,
    Query(params): Query<TileParams>,
) -> Result<Response, ServiceError> {
    let table = table_ref(&collection)?;
    let key = TileKey::new(table, tile_matrix_set, zoom, row, col);
    let response = state.service.tile(key, params.fields, params.filter).await?;

    let headers = [
        (header::CONTENT_TYPE, MVT_CONTENT_TYPE.to_string()),
        (header::CACHE_CONTROL, format!("max-age={}", response.max_age)),
        (
            header::HeaderName::from_static("tile-cache"),
            response.from_cache.to_string(),
        ),
    ];

    Ok(match response.payload {
        TilePayload::Content(bytes) => (StatusCode::OK, headers, bytes).into_response(),
        TilePayload::NoContent => (StatusCode::NO_CONTENT, headers).into_response(),
    })
}

async fn tiles_metadata(
    State(state): State<Arc<CollectionsState>>,
    Path((collection, _tile_matrix_set)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Json<Value>, ServiceError> {
    let table = table_ref(&collection)?;
    let metadata = state.service.tile_metadata(table).await?;

    let origin = headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .map(|host| format!("http://{}", host))
        .unwrap_or_default();
    let tiles = format!(
        "{}{}/{{tile_matrix}}/{{tile_row}}/{{tile_col}}",
        origin,
        uri.path().trim_end_matches("/metadata")
    );

    Ok(Json(tile_json(metadata, &tiles)))
}

async fn cache_size(
    State(state): State<Arc<CollectionsState>>,
    Path(collection): Path<String>,
) -> Result<Json<CacheSize>, ServiceError> {
    let table = table_ref(&collection)?;
    Ok(Json(state.service.cache_size(table).await?))
}

async fn delete_cache(
    State(state): State<Arc<CollectionsState>>,
    Path(collection): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    let table = table_ref(&collection)?;
    let outcome = state.service.purge_cache(table).await?;
    Ok(Json(json!({
        "status": "deleted",
        "epoch": outcome.epoch,
        "removed": outcome.removed,
    })))
}

async fn bins(
    State(state): State<Arc<CollectionsState>>,
    Path(collection): Path<String>,
    Json(request): Json<BinsRequest>,
) -> Result<Json<BreaksResponse>, ServiceError> {
    let table = table_ref(&collection)?;
    Ok(Json(state.service.bins(table, request).await?))
}

async fn numeric_breaks(
    State(state): State<Arc<CollectionsState>>,
    Path(collection): Path<String>,
    Json(request): Json<NumericBreaksRequest>,
) -> Result<Json<BreaksResponse>, ServiceError> {
    let table = table_ref(&collection)?;
    Ok(Json(state.service.numeric_breaks(table, request).await?))
}

async fn custom_break_values(
    State(state): State<Arc<CollectionsState>>,
    Path(collection): Path<String>,
    Json(request): Json<CustomBreaksRequest>,
) -> Result<Json<BreaksResponse>, ServiceError> {
    let table = table_ref(&collection)?;
    Ok(Json(state.service.custom_breaks(table, request).await?))
}

async fn statistics(
    State(state): State<Arc<CollectionsState>>,
    Path(collection): Path<String>,
    Json(request): Json<StatisticsRequest>,
) -> Result<Json<StatisticsResponse>, ServiceError> {
    let table = table_ref(&collection)?;
    Ok(Json(state.service.statistics(table, request).await?))
}

async fn autocomplete(
    State(state): State<Arc<CollectionsState>>,
    Path((collection, column, q)): Path<(String, String, String)>,
    Query(params): Query<AutocompleteParams>,
) -> Result<Json<AutocompleteResponse>, ServiceError> {
    let table = table_ref(&collection)?;
    let limit = params.limit.unwrap_or(DEFAULT_AUTOCOMPLETE_LIMIT);
    Ok(Json(state.service.autocomplete(table, column, q, limit).await?))
}

async fn add_column(
    State(state): State<Arc<CollectionsState>>,
    Path(collection): Path<String>,
    Json(request): Json<AddColumnRequest>,
) -> Result<Json<Value>, ServiceError> {
    let table = table_ref(&collection)?;
    let epoch = state.service.add_column(table, request).await?;
    Ok(Json(json!({ "status": true, "epoch": epoch })))
}

async fn drop_column(
    State(state): State<Arc<CollectionsState>>,
    Path((collection, column)): Path<(String, String)>,
) -> Result<Json<Value>, ServiceError> {
    let table = table_ref(&collection)?;
    let epoch = state.service.drop_column(table, column).await?;
    Ok(Json(json!({ "status": true, "epoch": epoch })))
}

// =============================================================================
// Response Shaping
// =============================================================================

/// GeoJSON FeatureCollection with paging links
fn feature_collection(page: ItemsPage, path: &str, query: Option<&str>) -> Value {
    let mut links = vec![link("self", "This document as GeoJSON", &href(path, query, None))];
    if let Some(next) = page.next_offset() {
        links.push(link("next", "Next page", &href(path, query, Some(next))));
    }
    if let Some(prev) = page.prev_offset() {
        links.push(link("prev", "Previous page", &href(path, query, Some(prev))));
    }

    let number_matched = page.number_matched;
    let number_returned = page.number_returned();
    let features: Vec<Value> = page
        .features
        .into_iter()
        .map(|row| row.into_feature())
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": features,
        "numberMatched": number_matched,
        "numberReturned": number_returned,
        "timeStamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "links": links,
    })
}

/// GeoJSON Feature with links to itself, its page and its collection
fn single_feature(row: FeatureRow, path: &str) -> Value {
    let items = path.rsplit_once('/').map(|(items, _)| items).unwrap_or(path);
    let collection = items.trim_end_matches("/items");

    let mut feature = row.into_feature();
    feature["links"] = json!([
        link("self", "This document as GeoJSON", path),
        link("items", "Items as GeoJSON", items),
        {
            "type": "application/json",
            "rel": "collection",
            "title": "Collection",
            "href": collection,
        },
    ]);
    feature
}

/// TileJSON 3.0.0 document with one vector layer named after the table
fn tile_json(metadata: TileMetadata, tiles: &str) -> Value {
    let mut fields = Map::new();
    for column in &metadata.fields {
        let kind = if column.kind.is_numeric() { "numeric" } else { "string" };
        fields.insert(column.name.clone(), Value::from(kind));
    }

    let mut body = json!({
        "tilejson": "3.0.0",
        "name": metadata.name,
        "tiles": [tiles],
        "minzoom": MIN_ZOOM,
        "maxzoom": MAX_ZOOM,
        "scheme": "xyz",
        "vector_layers": [{
            "id": metadata.name,
            "fields": fields,
            "minzoom": MIN_ZOOM,
            "maxzoom": MAX_ZOOM,
        }],
    });
    if let Some(bounds) = metadata.bounds {
        body["bounds"] = json!([bounds.minx, bounds.miny, bounds.maxx, bounds.maxy]);
    }
    body
}

fn link(rel: &str, title: &str, href: &str) -> Value {
    json!({
        "type": "application/geo+json",
        "rel": rel,
        "title": title,
        "href": href,
    })
}

/// `path?query`, with the `offset` pair replaced when `offset` is set
fn href(path: &str, query: Option<&str>, offset: Option<u64>) -> String {
    let mut pairs: Vec<String> = query
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| offset.is_none() || !pair.starts_with("offset="))
        .map(str::to_string)
        .collect();

    if let Some(offset) = offset {
        pairs.push(format!("offset={}", offset));
    }

    if pairs.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, pairs.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnInfo;
    use crate::query::BoundingBox;

    #[test]
    fn test_href_replaces_offset() {
        let path = "/api/v1/collections/public.states/items";
        assert_eq!(href(path, None, None), path);
        assert_eq!(
            href(path, Some("limit=10&offset=0"), Some(10)),
            format!("{}?limit=10&offset=10", path)
        );
        assert_eq!(
            href(path, Some("limit=10&offset=0"), None),
            format!("{}?limit=10&offset=0", path)
        );
    }

    #[test]
    fn test_feature_collection_shape() {
        let page = ItemsPage {
            features: vec![FeatureRow::new(1), FeatureRow::new(2)],
            number_matched: 5,
            limit: 2,
            offset: 0,
        };

        let body = feature_collection(page, "/items", Some("limit=2"));
        assert_eq!(body["type"], "FeatureCollection");
        assert_eq!(body["numberMatched"], 5);
        assert_eq!(body["numberReturned"], 2);

        let rels: Vec<&str> = body["links"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["rel"].as_str().unwrap())
            .collect();
        assert_eq!(rels, vec!["self", "next"]);
        assert_eq!(body["links"][1]["href"], "/items?limit=2&offset=2");
    }

    #[test]
    fn test_single_feature_links() {
        let path = "/api/v1/collections/public.states/items/7";
        let body = single_feature(FeatureRow::new(7), path);

        assert_eq!(body["type"], "Feature");
        assert_eq!(body["links"][0]["href"], path);
        assert_eq!(body["links"][1]["href"], "/api/v1/collections/public.states/items");
        assert_eq!(body["links"][2]["href"], "/api/v1/collections/public.states");
    }

    #[test]
    fn test_tile_json_shape() {
        let metadata = TileMetadata {
            name: "public.states".into(),
            bounds: Some(BoundingBox::new(-125.0, 24.0, -66.0, 49.0).unwrap()),
            fields: vec![ColumnInfo::numeric("gid"), ColumnInfo::text("state_name")],
        };
        let body = tile_json(metadata, "/tiles/{tile_matrix}/{tile_row}/{tile_col}");

        assert_eq!(body["tilejson"], "3.0.0");
        assert_eq!(body["bounds"], json!([-125.0, 24.0, -66.0, 49.0]));
        assert_eq!(body["vector_layers"][0]["id"], "public.states");
        assert_eq!(body["vector_layers"][0]["fields"]["gid"], "numeric");
        assert_eq!(body["vector_layers"][0]["fields"]["state_name"], "string");

        let empty = TileMetadata {
            name: "public.empty".into(),
            bounds: None,
            fields: Vec::new(),
        };
        assert!(tile_json(empty, "/t").get("bounds").is_none());
    }
}
