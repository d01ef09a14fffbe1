//! # Collection Service
//!
//! Orchestrates one request: catalog snapshot, filter compilation, assembly,
//! storage execution and the tile cache. Catalog, storage and cache calls are
//! blocking and run on the tokio blocking pool; the async methods only await
//! them.
//!
//! Cache failures never fail a tile request. They are logged, counted and
//! treated as a miss.
//!
//! Every mutation, reported or applied through [`CollectionService::add_column`]
//! and [`CollectionService::drop_column`], moves the table to a new cache epoch.
//! Dead epochs are then deleted on the blocking pool without holding up the
//! caller.

use std::sync::Arc;

use serde_json::Map;

use crate::catalog::{Catalog, ColumnCatalog, ColumnInfo, SchemaChange, TableRef};
use crate::classify::{
    check_bucket_count, classify, custom_breaks, equal_interval, stitch_external_breaks,
    BucketBounds, ClassifyError,
};
use crate::config::ServiceConfig;
use crate::filter::Predicate;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::query::{
    AssembledQuery, ClosestRequest, ItemRequest, ItemsRequest, QueryAssembler, StatisticsRequest,
    DEFAULT_MAX_FEATURES, DEFAULT_SURROGATE_KEY,
};
use crate::storage::{FeatureRow, StorageExecutor};
use crate::tile_cache::{CacheError, CachePolicy, Probe, TileCache, TileKey};

use super::errors::{ServiceError, ServiceResult};
use super::models::{
    AddColumnRequest, AutocompleteResponse, BinsRequest, BreaksResponse, CacheSize,
    CustomBreaksRequest, ItemsPage, NumericBreaksRequest, PurgeOutcome, StatisticsResponse,
    TileMetadata, TilePayload, TileResponse,
};

/// Assembly settings shared by every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub surrogate_key: String,
    pub storage_srid: u32,
    pub max_features_per_tile: u32,
    /// Most buckets one classification request may ask for
    pub max_buckets: usize,
    /// Delete dead cache epochs in the background after a mutation
    pub purge_on_mutation: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            surrogate_key: DEFAULT_SURROGATE_KEY.to_string(),
            storage_srid: 4326,
            max_features_per_tile: DEFAULT_MAX_FEATURES,
            max_buckets: 100,
            purge_on_mutation: true,
        }
    }
}

impl From<&ServiceConfig> for ServiceSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            surrogate_key: config.surrogate_key.clone(),
            storage_srid: config.storage_srid,
            max_features_per_tile: config.max_features_per_tile,
            max_buckets: config.max_buckets,
            purge_on_mutation: config.purge_on_mutation,
        }
    }
}

/// Collection operations over a catalog, a storage executor and a tile cache
#[derive(Clone)]
pub struct CollectionService {
    catalog: Arc<dyn ColumnCatalog>,
    storage: Arc<dyn StorageExecutor>,
    cache: Arc<TileCache>,
    metrics: Arc<MetricsRegistry>,
    settings: Arc<ServiceSettings>,
}

impl CollectionService {
    pub fn new(
        settings: ServiceSettings,
        catalog: Arc<dyn ColumnCatalog>,
        storage: Arc<dyn StorageExecutor>,
        cache: Arc<TileCache>,
    ) -> Self {
        Self {
            catalog,
            storage,
            cache,
            metrics: Arc::new(MetricsRegistry::new()),
            settings: Arc::new(settings),
        }
    }

    /// Service with a local tile cache under `config.cache_dir`
    pub fn from_config(
        config: &ServiceConfig,
        catalog: Arc<dyn ColumnCatalog>,
        storage: Arc<dyn StorageExecutor>,
    ) -> Self {
        let cache = TileCache::local(config.cache_dir.clone(), config.cache_max_age());
        Self::new(config.into(), catalog, storage, Arc::new(cache))
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// One page of features and the total match count
    pub async fn items(&self, table: TableRef, request: ItemsRequest) -> ServiceResult<ItemsPage> {
        self.run_blocking(table, move |service, table| service.items_blocking(table, &request))
            .await
    }

    /// One feature by surrogate key
    pub async fn item(
        &self,
        table: TableRef,
        id: String,
        request: ItemRequest,
    ) -> ServiceResult<FeatureRow> {
        self.run_blocking(table, move |service, table| {
            service.item_blocking(table, &id, &request)
        })
        .await
    }

    /// Features nearest to a point, with their distance in kilometers
    pub async fn closest(
        &self,
        table: TableRef,
        request: ClosestRequest,
    ) -> ServiceResult<ItemsPage> {
        self.run_blocking(table, move |service, table| {
            let catalog = service.snapshot(table)?;
            let assembled = service.assembler(&catalog).assemble_closest(&request)?;
            service.fetch_page(table, assembled)
        })
        .await
    }

    pub async fn statistics(
        &self,
        table: TableRef,
        request: StatisticsRequest,
    ) -> ServiceResult<StatisticsResponse> {
        self.run_blocking(table, move |service, table| {
            service.statistics_blocking(table, &request)
        })
        .await
    }

    /// Distinct values of a text column containing `search`
    pub async fn autocomplete(
        &self,
        table: TableRef,
        column: String,
        search: String,
        limit: u64,
    ) -> ServiceResult<AutocompleteResponse> {
        self.run_blocking(table, move |service, table| {
            let catalog = service.snapshot(table)?;
            let query = service
                .assembler(&catalog)
                .autocomplete(&column, &search, limit)?;
            service.assembled(table);
            Ok(AutocompleteResponse {
                values: service.storage.distinct_values(&query)?,
            })
        })
        .await
    }

    /// Layer name, WGS84 bounds and property columns for tile clients
    pub async fn tile_metadata(&self, table: TableRef) -> ServiceResult<TileMetadata> {
        self.run_blocking(table, |service, table| {
            let catalog = service.snapshot(table)?;
            let query = service.assembler(&catalog).extent()?;
            service.assembled(table);
            Ok(TileMetadata {
                name: table.to_string(),
                bounds: service.storage.extent(&query)?,
                fields: catalog.property_columns().cloned().collect(),
            })
        })
        .await
    }

    /// Property columns usable in filters and projections
    pub async fn queryables(&self, table: TableRef) -> ServiceResult<Vec<ColumnInfo>> {
        self.run_blocking(table, |service, table| {
            let catalog = service.snapshot(table)?;
            Ok(catalog.property_columns().cloned().collect())
        })
        .await
    }

    /// Encoded tile, read through the cache
    pub async fn tile(
        &self,
        key: TileKey,
        fields: Option<String>,
        filter: Option<String>,
    ) -> ServiceResult<TileResponse> {
        let table = key.table.clone();
        self.run_blocking(table, move |service, _| {
            service.tile_blocking(key, fields.as_deref(), filter.as_deref())
        })
        .await
    }

    /// Equal-interval bins over the observed range of a column
    pub async fn bins(&self, table: TableRef, request: BinsRequest) -> ServiceResult<BreaksResponse> {
        self.run_blocking(table, move |service, table| service.bins_blocking(table, &request))
            .await
    }

    pub async fn numeric_breaks(
        &self,
        table: TableRef,
        request: NumericBreaksRequest,
    ) -> ServiceResult<BreaksResponse> {
        self.run_blocking(table, move |service, table| {
            service.numeric_breaks_blocking(table, &request)
        })
        .await
    }

    /// Counts for caller-supplied ranges
    pub async fn custom_breaks(
        &self,
        table: TableRef,
        request: CustomBreaksRequest,
    ) -> ServiceResult<BreaksResponse> {
        self.run_blocking(table, move |service, table| {
            service.custom_breaks_blocking(table, &request)
        })
        .await
    }

    /// Notify the service that rows or schema of `table` changed.
    ///
    /// Returns the table's new cache epoch.
    pub async fn record_mutation(&self, table: TableRef) -> ServiceResult<u64> {
        let epoch = self
            .run_blocking(table.clone(), |service, table| service.invalidate_blocking(table))
            .await?;
        self.purge_in_background(table);
        Ok(epoch)
    }

    /// Add a column in storage and the catalog; returns the new cache epoch
    pub async fn add_column(
        &self,
        table: TableRef,
        request: AddColumnRequest,
    ) -> ServiceResult<u64> {
        let change = SchemaChange::AddColumn {
            table: table.clone(),
            column: request.column_name.trim().to_string(),
            column_type: request.column_type,
        };
        self.change_schema(table, change).await
    }

    /// Drop a column if present; returns the new cache epoch
    pub async fn drop_column(&self, table: TableRef, column: String) -> ServiceResult<u64> {
        let change = SchemaChange::DropColumn {
            table: table.clone(),
            column,
        };
        self.change_schema(table, change).await
    }

    pub async fn cache_size(&self, table: TableRef) -> ServiceResult<CacheSize> {
        self.run_blocking(table, |service, table| {
            let bytes = service
                .cache
                .cache_size(table)
                .map_err(|e| service.cache_failure(&table.to_string(), e))?;
            Ok(CacheSize::from_bytes(bytes))
        })
        .await
    }

    /// Invalidate `table` and delete every dead epoch from disk
    pub async fn purge_cache(&self, table: TableRef) -> ServiceResult<PurgeOutcome> {
        self.run_blocking(table, |service, table| {
            let name = table.to_string();
            let epoch = service.invalidate_blocking(table)?;

            let removed = service
                .cache
                .purge_stale(table)
                .map_err(|e| service.cache_failure(&name, e))?;
            service.metrics.add_epochs_purged(removed as u64);

            log_event_with_fields(
                Event::CachePurged,
                &[("table", &name), ("removed", &removed.to_string())],
            );
            Ok(PurgeOutcome { epoch, removed })
        })
        .await
    }

    // =========================================================================
    // Blocking bodies
    // =========================================================================

    fn items_blocking(&self, table: &TableRef, request: &ItemsRequest) -> ServiceResult<ItemsPage> {
        let catalog = self.snapshot(table)?;
        let assembled = self.assembler(&catalog).assemble(request)?;
        self.fetch_page(table, assembled)
    }

    fn fetch_page(&self, table: &TableRef, assembled: AssembledQuery) -> ServiceResult<ItemsPage> {
        self.assembled(table);

        let features = self.storage.fetch_features(&assembled.query)?;
        let number_matched = self.storage.count(&assembled.count)?;

        Ok(ItemsPage {
            features,
            number_matched,
            limit: assembled.query.pagination.limit,
            offset: assembled.query.pagination.offset,
        })
    }

    fn item_blocking(
        &self,
        table: &TableRef,
        id: &str,
        request: &ItemRequest,
    ) -> ServiceResult<FeatureRow> {
        let catalog = self.snapshot(table)?;
        let query = self.assembler(&catalog).assemble_item(id, request)?;
        self.assembled(table);

        self.storage
            .fetch_features(&query)?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::ItemNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })
    }

    fn statistics_blocking(
        &self,
        table: &TableRef,
        request: &StatisticsRequest,
    ) -> ServiceResult<StatisticsResponse> {
        let catalog = self.snapshot(table)?;
        let query = self.assembler(&catalog).statistics(request)?;
        self.assembled(table);

        let mut results = match &query.aggregates {
            Some(aggregates) => self.storage.aggregate(aggregates)?,
            None => Map::new(),
        };
        for distinct in &query.distinct {
            let groups = self.storage.distinct_groups(distinct)?;
            results.insert(
                distinct.alias(),
                serde_json::Value::Array(groups.into_iter().map(serde_json::Value::Object).collect()),
            );
        }
        Ok(StatisticsResponse { results })
    }

    /// Storage first, then the catalog mirror, then the cache epoch. The
    /// epoch moves even if the catalog could not mirror the change.
    fn schema_change_blocking(&self, table: &TableRef, change: &SchemaChange) -> ServiceResult<u64> {
        let catalog = self.snapshot(table)?;
        let column = change.column();
        if column.is_empty() {
            return Err(ServiceError::InvalidParameter(
                "column_name must not be empty".to_string(),
            ));
        }
        match change {
            SchemaChange::AddColumn { .. } if catalog.contains(column) => {
                return Err(ServiceError::InvalidParameter(format!(
                    "Column: {} already exists on {}",
                    column, table
                )));
            }
            SchemaChange::DropColumn { .. } if column == self.settings.surrogate_key => {
                return Err(ServiceError::InvalidParameter(format!(
                    "Column: {} is the surrogate key of {}",
                    column, table
                )));
            }
            _ => {}
        }

        self.storage.alter_table(change)?;
        let mirrored = self.catalog.apply_change(change);
        self.metrics.increment_schema_changes();
        log_event_with_fields(
            Event::SchemaChanged,
            &[("table", &table.to_string()), ("column", column)],
        );

        let epoch = self.invalidate_blocking(table)?;
        mirrored?;
        Ok(epoch)
    }

    fn tile_blocking(
        &self,
        key: TileKey,
        fields: Option<&str>,
        filter: Option<&str>,
    ) -> ServiceResult<TileResponse> {
        let policy = CachePolicy::new(self.cache.max_age().as_secs());
        let max_age = policy.response_max_age(fields, filter);
        let tile = key.to_string();

        let pending = if policy.allows_store(fields, filter) {
            match self.cache.probe(&key) {
                Ok(Probe::Cached(bytes)) => {
                    self.metrics.increment_cache_hits();
                    log_event_with_fields(Event::TileCacheHit, &[("tile", &tile)]);
                    return Ok(TileResponse {
                        payload: TilePayload::from_bytes(bytes),
                        from_cache: true,
                        max_age,
                    });
                }
                Ok(Probe::Pending(pending)) => {
                    self.metrics.increment_cache_misses();
                    log_event_with_fields(Event::TileCacheMiss, &[("tile", &tile)]);
                    Some(pending)
                }
                Err(e) => {
                    self.cache_failure(&tile, e);
                    None
                }
            }
        } else {
            None
        };

        let catalog = self.snapshot(&key.table)?;
        let query = self.assembler(&catalog).assemble_tile(
            key,
            fields,
            filter,
            self.settings.max_features_per_tile,
        )?;
        self.assembled(catalog.table());

        let bytes = self.storage.fetch_tile(&query)?;

        if let Some(pending) = pending {
            match self.cache.fill(pending, &bytes) {
                Ok(()) => {
                    self.metrics.increment_cache_stores();
                    log_event_with_fields(
                        Event::TileCacheStored,
                        &[("tile", &tile), ("bytes", &bytes.len().to_string())],
                    );
                }
                Err(e) => {
                    self.cache_failure(&tile, e);
                }
            }
        }

        Ok(TileResponse {
            payload: TilePayload::from_bytes(bytes),
            from_cache: false,
            max_age,
        })
    }

    fn bins_blocking(&self, table: &TableRef, request: &BinsRequest) -> ServiceResult<BreaksResponse> {
        check_bucket_count(request.number_of_bins as usize, self.settings.max_buckets)?;

        let catalog = self.snapshot(table)?;
        let assembler = self.assembler(&catalog);
        let range_query = assembler.column_range(&request.column, request.filter.as_deref())?;
        self.assembled(table);

        let range = match self.storage.column_range(&range_query)? {
            Some(range) => range,
            None => return Ok(BreaksResponse { results: Vec::new() }),
        };

        let buckets = equal_interval(range.min, range.max, request.number_of_bins)?;
        self.count_buckets(
            &assembler,
            &request.column,
            &buckets,
            range_query.predicate.as_ref(),
        )
    }

    fn numeric_breaks_blocking(
        &self,
        table: &TableRef,
        request: &NumericBreaksRequest,
    ) -> ServiceResult<BreaksResponse> {
        if request.break_type.is_local() {
            let bins = BinsRequest {
                column: request.column.clone(),
                number_of_bins: request.number_of_breaks,
                filter: request.filter.clone(),
            };
            return self.bins_blocking(table, &bins);
        }

        let catalog = self.snapshot(table)?;
        let assembler = self.assembler(&catalog);
        let breakpoint_query = assembler.breakpoints(
            &request.column,
            request.break_type,
            request.number_of_breaks,
            request.filter.as_deref(),
        )?;
        let range_query = assembler.column_range(&request.column, request.filter.as_deref())?;
        self.assembled(table);

        let breakpoints = self.storage.breakpoints(&breakpoint_query)?;
        let range = match self.storage.column_range(&range_query)? {
            Some(range) => range,
            None => return Ok(BreaksResponse { results: Vec::new() }),
        };

        let buckets = stitch_external_breaks(&breakpoints, range.min, range.max);
        self.count_buckets(
            &assembler,
            &request.column,
            &buckets,
            range_query.predicate.as_ref(),
        )
    }

    fn custom_breaks_blocking(
        &self,
        table: &TableRef,
        request: &CustomBreaksRequest,
    ) -> ServiceResult<BreaksResponse> {
        let catalog = self.snapshot(table)?;
        let assembler = self.assembler(&catalog);
        // Validates the column and compiles the filter even for an empty range list
        let range_query = assembler.column_range(&request.column, request.filter.as_deref())?;
        let max = self.settings.max_buckets;
        if request.breaks.len() > max {
            let requested = request.breaks.len();
            return Err(ClassifyError::TooManyBuckets { requested, max }.into());
        }
        self.assembled(table);

        let ranges: Vec<(f64, f64)> = request.breaks.iter().map(|b| (b.min, b.max)).collect();
        let buckets = custom_breaks(&ranges);
        self.count_buckets(
            &assembler,
            &request.column,
            &buckets,
            range_query.predicate.as_ref(),
        )
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn change_schema(&self, table: TableRef, change: SchemaChange) -> ServiceResult<u64> {
        let epoch = self
            .run_blocking(table.clone(), move |service, table| {
                service.schema_change_blocking(table, &change)
            })
            .await?;
        self.purge_in_background(table);
        Ok(epoch)
    }

    fn invalidate_blocking(&self, table: &TableRef) -> ServiceResult<u64> {
        let epoch = self
            .cache
            .invalidate_table(table)
            .map_err(|e| self.cache_failure(&table.to_string(), e))?;
        self.metrics.increment_invalidations();
        log_event_with_fields(
            Event::TableInvalidated,
            &[("table", &table.to_string()), ("epoch", &epoch.to_string())],
        );
        Ok(epoch)
    }

    /// Delete dead epochs of `table` on the blocking pool; failures are
    /// logged and counted only
    fn purge_in_background(&self, table: TableRef) {
        if !self.settings.purge_on_mutation {
            return;
        }
        let service = self.clone();
        tokio::task::spawn_blocking(move || {
            let name = table.to_string();
            match service.cache.purge_stale(&table) {
                Ok(removed) => {
                    service.metrics.add_epochs_purged(removed as u64);
                    log_event_with_fields(
                        Event::CachePurged,
                        &[("table", &name), ("removed", &removed.to_string())],
                    );
                }
                Err(e) => {
                    service.cache_failure(&name, e);
                }
            }
        });
    }

    async fn run_blocking<T, F>(&self, table: TableRef, op: F) -> ServiceResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&CollectionService, &TableRef) -> ServiceResult<T> + Send + 'static,
    {
        let service = self.clone();
        tokio::task::spawn_blocking(move || {
            let result = op(&service, &table);
            if let Err(err) = &result {
                service.observe_failure(&table, err);
            }
            result
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("blocking task failed: {}", e)))?
    }

    fn snapshot(&self, table: &TableRef) -> ServiceResult<Catalog> {
        Ok(self.catalog.snapshot(table)?)
    }

    fn assembler<'a>(&self, catalog: &'a Catalog) -> QueryAssembler<'a> {
        QueryAssembler::new(catalog)
            .with_surrogate_key(self.settings.surrogate_key.as_str())
            .with_storage_srid(self.settings.storage_srid)
            .with_max_buckets(self.settings.max_buckets)
    }

    fn assembled(&self, table: &TableRef) {
        self.metrics.increment_queries_assembled();
        log_event_with_fields(Event::QueryAssembled, &[("table", &table.to_string())]);
    }

    fn count_buckets(
        &self,
        assembler: &QueryAssembler<'_>,
        column: &str,
        buckets: &[BucketBounds],
        filter: Option<&Predicate>,
    ) -> ServiceResult<BreaksResponse> {
        let results = classify(buckets, |bucket| -> ServiceResult<u64> {
            let count = assembler.bucket_count(column, bucket, filter)?;
            Ok(self.storage.count(&count)?)
        })?;
        Ok(BreaksResponse { results })
    }

    /// Log and count a cache failure; the returned error is only surfaced by
    /// operator endpoints
    fn cache_failure(&self, subject: &str, err: CacheError) -> ServiceError {
        self.metrics.increment_cache_io_errors();
        log_event_with_fields(
            Event::TileCacheError,
            &[("subject", subject), ("detail", &err.to_string())],
        );
        ServiceError::Internal(err.to_string())
    }

    fn observe_failure(&self, table: &TableRef, err: &ServiceError) {
        let table = table.to_string();
        if err.is_rejection() {
            self.metrics.increment_filters_rejected();
            log_event_with_fields(
                Event::FilterRejected,
                &[("table", &table), ("detail", &err.detail())],
            );
        } else if let ServiceError::Storage(storage) = err {
            self.metrics.increment_storage_errors();
            log_event_with_fields(
                Event::StorageFailed,
                &[
                    ("table", &table),
                    ("kind", storage.kind().code()),
                    ("detail", storage.message()),
                ],
            );
        }
    }
}

impl std::fmt::Debug for CollectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionService")
            .field("cache", &self.cache)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnInfo, ColumnKind, ColumnType, MemoryCatalog};
    use crate::query::{
        AggregateQuery, AutocompleteQuery, BoundingBox, BreakpointQuery, ColumnRangeQuery,
        CountDescriptor, DistinctQuery, ExtentQuery, QueryDescriptor, TileQuery,
    };
    use crate::storage::{ColumnRange, StorageError, StorageResult};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingStorage {
        tiles: AtomicUsize,
        alters: AtomicUsize,
    }

    impl StorageExecutor for CountingStorage {
        fn fetch_features(&self, _query: &QueryDescriptor) -> StorageResult<Vec<FeatureRow>> {
            Ok(vec![FeatureRow::new(1).with_property("name", "Ohio")])
        }

        fn count(&self, _count: &CountDescriptor) -> StorageResult<u64> {
            Ok(1)
        }

        fn fetch_tile(&self, _tile: &TileQuery) -> StorageResult<Vec<u8>> {
            self.tiles.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0x1a, 0x02])
        }

        fn column_range(&self, _range: &ColumnRangeQuery) -> StorageResult<Option<ColumnRange>> {
            Ok(Some(ColumnRange { min: 0.0, max: 100.0 }))
        }

        fn breakpoints(&self, _query: &BreakpointQuery) -> StorageResult<Vec<f64>> {
            Err(StorageError::other("no classification functions installed"))
        }

        fn aggregate(&self, _query: &AggregateQuery) -> StorageResult<Map<String, Value>> {
            Ok(Map::new())
        }

        fn distinct_groups(&self, _query: &DistinctQuery) -> StorageResult<Vec<Map<String, Value>>> {
            Ok(Vec::new())
        }

        fn distinct_values(&self, _query: &AutocompleteQuery) -> StorageResult<Vec<Value>> {
            Ok(Vec::new())
        }

        fn extent(&self, _query: &ExtentQuery) -> StorageResult<Option<BoundingBox>> {
            Ok(None)
        }

        fn alter_table(&self, _change: &SchemaChange) -> StorageResult<()> {
            self.alters.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn service(dir: &TempDir, max_age: u64) -> (CollectionService, Arc<CountingStorage>) {
        service_with_settings(dir, max_age, ServiceSettings::default())
    }

    fn service_with_settings(
        dir: &TempDir,
        max_age: u64,
        settings: ServiceSettings,
    ) -> (CollectionService, Arc<CountingStorage>) {
        let catalog = MemoryCatalog::new();
        catalog
            .register(
                TableRef::new("public", "states"),
                vec![
                    ColumnInfo::numeric("gid"),
                    ColumnInfo::text("name"),
                    ColumnInfo::geometry("geom"),
                ],
            )
            .unwrap();
        let storage = Arc::new(CountingStorage::default());
        let cache = TileCache::local(dir.path(), Duration::from_secs(max_age));
        let service = CollectionService::new(
            settings,
            Arc::new(catalog),
            storage.clone(),
            Arc::new(cache),
        );
        (service, storage)
    }

    fn states() -> TableRef {
        TableRef::new("public", "states")
    }

    /// Poll `check` for up to two seconds
    async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        check()
    }

    fn key() -> TileKey {
        TileKey::new(TableRef::new("public", "states"), "WebMercatorQuad", 3, 2, 1)
    }

    #[tokio::test]
    async fn test_second_tile_request_hits_cache() {
        let dir = TempDir::new().unwrap();
        let (service, storage) = service(&dir, 60);

        let first = service.tile(key(), None, None).await.unwrap();
        let second = service.tile(key(), None, None).await.unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(second.payload, TilePayload::Content(vec![0x1a, 0x02]));
        assert_eq!(storage.tiles.load(Ordering::SeqCst), 1);
        assert_eq!(service.metrics().snapshot().tile_cache_hits, 1);
    }

    #[tokio::test]
    async fn test_filtered_tile_bypasses_cache() {
        let dir = TempDir::new().unwrap();
        let (service, storage) = service(&dir, 60);

        let filter = Some("name = 'Ohio'".to_string());
        service.tile(key(), None, filter.clone()).await.unwrap();
        let response = service.tile(key(), None, filter).await.unwrap();

        assert!(!response.from_cache);
        assert_eq!(response.max_age, 0);
        assert_eq!(storage.tiles.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejection_is_counted() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(&dir, 60);

        let request = ItemsRequest::default().with_filter("name LI 'Ohio'");
        let err = service
            .items(TableRef::new("public", "states"), request)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Syntax { .. }));
        assert_eq!(service.metrics().snapshot().filters_rejected, 1);
    }

    #[tokio::test]
    async fn test_add_column_updates_catalog_and_epoch() {
        let dir = TempDir::new().unwrap();
        let (service, storage) = service(&dir, 60);

        service.tile(key(), None, None).await.unwrap();
        let request = AddColumnRequest {
            column_name: " median_age ".into(),
            column_type: ColumnType::DoublePrecision,
        };
        let epoch = service.add_column(states(), request).await.unwrap();

        assert_eq!(epoch, 1);
        assert_eq!(storage.alters.load(Ordering::SeqCst), 1);
        let columns = service.queryables(states()).await.unwrap();
        assert!(columns.contains(&ColumnInfo::new("median_age", ColumnKind::Numeric)));

        let after = service.tile(key(), None, None).await.unwrap();
        assert!(!after.from_cache);
        assert_eq!(storage.tiles.load(Ordering::SeqCst), 2);

        let snapshot = service.metrics().snapshot();
        assert_eq!(snapshot.schema_changes, 1);
        assert_eq!(snapshot.invalidations, 1);
    }

    #[tokio::test]
    async fn test_schema_change_rejections_leave_storage_alone() {
        let dir = TempDir::new().unwrap();
        let (service, storage) = service(&dir, 60);

        let duplicate = AddColumnRequest {
            column_name: "name".into(),
            column_type: ColumnType::Text,
        };
        let err = service.add_column(states(), duplicate).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidParameter(_)));

        let err = service.drop_column(states(), "gid".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidParameter(_)));

        let missing = TableRef::new("public", "nope");
        let err = service.drop_column(missing, "name".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::TableNotFound(_)));

        assert_eq!(storage.alters.load(Ordering::SeqCst), 0);
        assert_eq!(service.metrics().snapshot().invalidations, 0);
    }

    #[tokio::test]
    async fn test_mutation_purges_dead_epochs_in_background() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(&dir, 60);

        service.tile(key(), None, None).await.unwrap();
        service.record_mutation(states()).await.unwrap();

        let cache = service.cache().clone();
        let purged = eventually(|| {
            let total = cache.cache_size(&states()).unwrap();
            let live = cache.live_size(&states()).unwrap();
            // Only the epoch marker may remain outside the live epoch
            total - live < 2
        })
        .await;
        assert!(purged);
        assert!(eventually(|| service.metrics().snapshot().epochs_purged == 1).await);
    }

    #[tokio::test]
    async fn test_background_purge_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let settings = ServiceSettings {
            purge_on_mutation: false,
            ..ServiceSettings::default()
        };
        let (service, _) = service_with_settings(&dir, 60, settings);

        service.tile(key(), None, None).await.unwrap();
        service.record_mutation(states()).await.unwrap();

        let outcome = service.purge_cache(states()).await.unwrap();
        assert_eq!(outcome.removed, 1);
        assert_eq!(service.metrics().snapshot().epochs_purged, 1);
    }
}
