//! # Query Assembler
//!
//! Merges the compiled filter, bounding box and implicit column filters into
//! one predicate and wraps it in descriptors. Predicates are conjoined in a
//! fixed order: explicit filter, bounding box, then column equalities in
//! catalog order.
//!
//! Single items, nearest features, statistics, autocomplete and table extent
//! are assembled from the same catalog snapshot.

use crate::catalog::{quote_ident, Catalog, ColumnInfo, ColumnKind};
use crate::classify::{check_bucket_count, BreakMethod, BucketBounds, MAX_BUCKETS};
use crate::filter::{column_equals, parse, FilterCompiler, Literal, Predicate, DEFAULT_SRID};
use crate::tile_cache::TileKey;

use super::bbox::BoundingBox;
use super::descriptor::{
    Aggregate, AggregateFunction, AggregateQuery, AssembledQuery, AutocompleteQuery,
    BreakpointQuery, ColumnRangeQuery, CountDescriptor, DistinctQuery, ExtentQuery, GeometryOutput,
    NearestTo, OrderBy, Pagination, QueryDescriptor, StatisticsQuery, TileQuery,
};
use super::errors::{QueryError, QueryResult};
use super::params::{ClosestRequest, ItemRequest, ItemsRequest, StatisticsRequest};

/// Surrogate key column assumed when none is configured
pub const DEFAULT_SURROGATE_KEY: &str = "gid";

/// Default cap on features encoded into one tile
pub const DEFAULT_MAX_FEATURES: u32 = 5000;

/// Most entries one statistics request may list
pub const MAX_STATISTICS: usize = 64;

/// Builds descriptors against one catalog snapshot
#[derive(Debug, Clone)]
pub struct QueryAssembler<'a> {
    catalog: &'a Catalog,
    surrogate_key: String,
    storage_srid: u32,
    max_buckets: usize,
}

impl<'a> QueryAssembler<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            surrogate_key: DEFAULT_SURROGATE_KEY.to_string(),
            storage_srid: DEFAULT_SRID,
            max_buckets: MAX_BUCKETS,
        }
    }

    pub fn with_surrogate_key(mut self, key: impl Into<String>) -> Self {
        self.surrogate_key = key.into();
        self
    }

    /// SRID of stored geometries, used for filter and bbox literals
    pub fn with_storage_srid(mut self, srid: u32) -> Self {
        self.storage_srid = srid;
        self
    }

    /// Cap on breakpoints requested from storage, never above [`MAX_BUCKETS`]
    pub fn with_max_buckets(mut self, max: usize) -> Self {
        self.max_buckets = max.min(MAX_BUCKETS);
        self
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Parse and compile optional filter text
    pub fn compile_filter(&self, filter: Option<&str>) -> QueryResult<Option<Predicate>> {
        match filter {
            Some(text) => {
                let ast = parse(text)?;
                let predicate = FilterCompiler::new(self.catalog)
                    .with_srid(self.storage_srid)
                    .compile(&ast)?;
                Ok(Some(predicate))
            }
            None => Ok(None),
        }
    }

    /// Feature page query plus its count
    pub fn assemble(&self, request: &ItemsRequest) -> QueryResult<AssembledQuery> {
        let mut conjuncts = Vec::new();

        if let Some(filter) = self.compile_filter(request.filter.as_deref())? {
            conjuncts.push(filter);
        }

        if let Some(raw) = &request.bbox {
            let bbox: BoundingBox = raw.parse()?;
            let geometry = self.require_geometry()?;
            conjuncts.push(bbox.predicate(&geometry.name, self.storage_srid));
        }

        for column in self.catalog.columns() {
            if column.kind == ColumnKind::Geometry {
                continue;
            }
            if let Some(raw) = request.column_filters.get(&column.name) {
                conjuncts.push(column_equals(column, raw));
            }
        }

        let predicate = if conjuncts.is_empty() {
            None
        } else {
            Some(Predicate::all(conjuncts))
        };

        let order_column = match &request.sortby {
            Some(column) => column.as_str(),
            None => self.surrogate_key.as_str(),
        };
        self.require_column(order_column)?;
        self.require_column(&self.surrogate_key)?;

        let query = QueryDescriptor {
            table: self.catalog.table().clone(),
            columns: self.projection(&request.properties)?,
            id_column: self.surrogate_key.clone(),
            geometry: self.geometry_output(request.return_geometry, request.srid),
            predicate: predicate.clone(),
            nearest: None,
            order_by: OrderBy {
                column: order_column.to_string(),
                direction: request.direction(),
            },
            pagination: Pagination {
                limit: request.limit,
                offset: request.offset,
            },
        };

        let count = CountDescriptor {
            table: self.catalog.table().clone(),
            predicate,
        };

        Ok(AssembledQuery { query, count })
    }

    /// One feature by surrogate key value, coerced like a column filter
    pub fn assemble_item(&self, id: &str, request: &ItemRequest) -> QueryResult<QueryDescriptor> {
        let key = self.require_column(&self.surrogate_key)?;

        Ok(QueryDescriptor {
            table: self.catalog.table().clone(),
            columns: self.projection(&request.properties)?,
            id_column: key.name.clone(),
            geometry: self.geometry_output(request.return_geometry, request.srid),
            predicate: Some(column_equals(key, id)),
            nearest: None,
            order_by: OrderBy::asc(key.name.clone()),
            pagination: Pagination {
                limit: 1,
                offset: 0,
            },
        })
    }

    /// Feature page ordered nearest first from a WGS84 point
    pub fn assemble_closest(&self, request: &ClosestRequest) -> QueryResult<AssembledQuery> {
        request.validate()?;
        let geometry = self.require_geometry()?;

        let mut page = request.page.clone();
        page.bbox = None;
        page.sortby = None;
        page.sortdesc = 1;
        page.column_filters.clear();

        let mut assembled = self.assemble(&page)?;
        assembled.query.nearest = Some(NearestTo {
            geometry_column: geometry.name.clone(),
            storage_srid: self.storage_srid,
            longitude: request.longitude,
            latitude: request.latitude,
        });
        Ok(assembled)
    }

    /// Aggregates and distinct groups under one optional filter
    pub fn statistics(&self, request: &StatisticsRequest) -> QueryResult<StatisticsQuery> {
        if request.aggregate_columns.len() > MAX_STATISTICS {
            return Err(QueryError::invalid_parameter(
                "aggregate_columns",
                format!("at most {} statistics per request", MAX_STATISTICS),
            ));
        }

        let predicate = self.compile_filter(request.filter.as_deref())?;
        let mut aggregates: Vec<Aggregate> = Vec::new();
        let mut distinct = Vec::new();

        for entry in &request.aggregate_columns {
            match entry.statistic.aggregate() {
                Some(function) => {
                    self.require_aggregatable(&entry.column, function)?;
                    let aggregate = Aggregate {
                        function,
                        column: entry.column.clone(),
                    };
                    if !aggregates.contains(&aggregate) {
                        aggregates.push(aggregate);
                    }
                }
                None => {
                    let (group_column, group_method) =
                        match (&entry.group_column, entry.group_method) {
                            (Some(column), Some(method)) => (column, method),
                            _ => {
                                return Err(QueryError::invalid_parameter(
                                    "aggregate_columns",
                                    format!(
                                        "distinct on {} needs group_column and group_method",
                                        entry.column
                                    ),
                                ))
                            }
                        };
                    self.require_aggregatable(&entry.column, AggregateFunction::Count)?;
                    self.require_aggregatable(group_column, group_method)?;
                    distinct.push(DistinctQuery {
                        table: self.catalog.table().clone(),
                        column: entry.column.clone(),
                        group_column: group_column.clone(),
                        group_method,
                        predicate: predicate.clone(),
                    });
                }
            }
        }

        let aggregates = (!aggregates.is_empty()).then(|| AggregateQuery {
            table: self.catalog.table().clone(),
            aggregates,
            predicate,
        });
        Ok(StatisticsQuery {
            aggregates,
            distinct,
        })
    }

    /// Distinct values of a text column containing `search`, case-insensitive
    pub fn autocomplete(
        &self,
        column: &str,
        search: &str,
        limit: u64,
    ) -> QueryResult<AutocompleteQuery> {
        let info = self.require_column(column)?;
        if info.kind != ColumnKind::Text {
            return Err(QueryError::invalid_parameter(
                "column",
                format!("{} is {}, expected text", column, info.kind),
            ));
        }
        Ok(AutocompleteQuery {
            table: self.catalog.table().clone(),
            column: info.name.clone(),
            pattern: format!("%{}%", escape_like(search)),
            limit,
        })
    }

    pub fn extent(&self) -> QueryResult<ExtentQuery> {
        let geometry = self.require_geometry()?;
        Ok(ExtentQuery {
            table: self.catalog.table().clone(),
            geometry_column: geometry.name.clone(),
        })
    }

    /// Vector tile query for `key`
    pub fn assemble_tile(
        &self,
        key: TileKey,
        fields: Option<&str>,
        filter: Option<&str>,
        max_features: u32,
    ) -> QueryResult<TileQuery> {
        let geometry = self.require_geometry()?;

        let properties = match fields {
            Some(list) => self.projection(list)?,
            None => self.projection("*")?,
        };

        let layer_name = key.table.to_string();

        Ok(TileQuery {
            key,
            geometry_column: geometry.name.clone(),
            properties,
            predicate: self.compile_filter(filter)?,
            max_features,
            layer_name,
        })
    }

    /// Min/max of a numeric column under an optional filter
    pub fn column_range(&self, column: &str, filter: Option<&str>) -> QueryResult<ColumnRangeQuery> {
        self.require_numeric(column)?;
        Ok(ColumnRangeQuery {
            table: self.catalog.table().clone(),
            column: column.to_string(),
            predicate: self.compile_filter(filter)?,
        })
    }

    /// Breakpoints computed by a storage-side classification function
    pub fn breakpoints(
        &self,
        column: &str,
        method: BreakMethod,
        breaks: u32,
        filter: Option<&str>,
    ) -> QueryResult<BreakpointQuery> {
        self.require_numeric(column)?;
        check_bucket_count(breaks as usize, self.max_buckets)
            .map_err(|e| QueryError::invalid_parameter("number_of_breaks", e.to_string()))?;
        Ok(BreakpointQuery {
            table: self.catalog.table().clone(),
            column: column.to_string(),
            method,
            breaks,
            predicate: self.compile_filter(filter)?,
        })
    }

    /// Count of rows inside one bucket, conjoined with `filter`
    pub fn bucket_count(
        &self,
        column: &str,
        bounds: &BucketBounds,
        filter: Option<&Predicate>,
    ) -> QueryResult<CountDescriptor> {
        let info = self.require_numeric(column)?;

        let quoted = quote_ident(&info.name);
        let lower_op = if bounds.lower_inclusive { ">=" } else { ">" };

        let mut range = Predicate::empty();
        range.push_sql(&format!("{} {} ", quoted, lower_op));
        range.push_param(Literal::Float(bounds.min));
        range.push_sql(&format!(" AND {} <= ", quoted));
        range.push_param(Literal::Float(bounds.max));

        let predicate = match filter {
            Some(filter) => filter.clone().and(range),
            None => range,
        };

        Ok(CountDescriptor {
            table: self.catalog.table().clone(),
            predicate: Some(predicate),
        })
    }

    /// Resolve a `properties`/`fields` value to property column names
    fn projection(&self, properties: &str) -> QueryResult<Vec<String>> {
        let properties = properties.trim();

        if properties == "*" {
            return Ok(self
                .catalog
                .property_columns()
                .map(|c| c.name.clone())
                .collect());
        }

        let mut columns = Vec::new();
        for name in properties.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let info = self.require_column(name)?;
            if info.kind == ColumnKind::Geometry {
                return Err(QueryError::invalid_parameter(
                    "properties",
                    format!("{} is the geometry column", name),
                ));
            }
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
        Ok(columns)
    }

    fn geometry_output(&self, return_geometry: bool, srid: u32) -> Option<GeometryOutput> {
        if !return_geometry {
            return None;
        }
        self.catalog.geometry_column().map(|g| GeometryOutput {
            column: g.name.clone(),
            srid,
        })
    }

    /// A property column that `function` can aggregate
    fn require_aggregatable(
        &self,
        name: &str,
        function: AggregateFunction,
    ) -> QueryResult<&'a ColumnInfo> {
        let info = self.require_column(name)?;
        if info.kind == ColumnKind::Geometry {
            return Err(QueryError::invalid_parameter(
                "column",
                format!("{} is the geometry column", name),
            ));
        }
        if function.requires_numeric() && !info.kind.is_numeric() {
            return Err(QueryError::invalid_parameter(
                "column",
                format!("{} of {} needs a numeric column", function.as_str(), name),
            ));
        }
        Ok(info)
    }

    fn require_column(&self, name: &str) -> QueryResult<&'a ColumnInfo> {
        self.catalog
            .get(name)
            .ok_or_else(|| QueryError::unknown_column(name, self.catalog.table()))
    }

    fn require_numeric(&self, name: &str) -> QueryResult<&'a ColumnInfo> {
        let info = self.require_column(name)?;
        if !info.kind.is_numeric() {
            return Err(QueryError::invalid_parameter(
                "column",
                format!("{} is {}, expected numeric", name, info.kind),
            ));
        }
        Ok(info)
    }

    fn require_geometry(&self) -> QueryResult<&'a ColumnInfo> {
        self.catalog
            .geometry_column()
            .ok_or_else(|| QueryError::MissingGeometryColumn(self.catalog.table().to_string()))
    }
}

/// Escape `LIKE` metacharacters so `search` matches literally
fn escape_like(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len());
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Assemble an items request with default settings
pub fn assemble(catalog: &Catalog, request: &ItemsRequest) -> QueryResult<AssembledQuery> {
    QueryAssembler::new(catalog).assemble(request)
}

/// Assemble a tile query with default settings
pub fn assemble_tile(
    catalog: &Catalog,
    key: TileKey,
    fields: Option<&str>,
    filter: Option<&str>,
    max_features: u32,
) -> QueryResult<TileQuery> {
    QueryAssembler::new(catalog).assemble_tile(key, fields, filter, max_features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableRef;
    use crate::filter::FilterError;
    use crate::query::SortDirection;

    fn states() -> Catalog {
        Catalog::new(
            TableRef::new("public", "states"),
            vec![
                ColumnInfo::numeric("gid"),
                ColumnInfo::text("state_name"),
                ColumnInfo::text("state_abbr"),
                ColumnInfo::numeric("population"),
                ColumnInfo::geometry("geom"),
            ],
        )
    }

    #[test]
    fn test_defaults() {
        let catalog = states();
        let assembled = assemble(&catalog, &ItemsRequest::default()).unwrap();
        let query = assembled.query;

        assert_eq!(query.columns, vec!["gid", "state_name", "state_abbr", "population"]);
        assert_eq!(query.order_by, OrderBy::asc("gid"));
        assert_eq!(query.pagination, Pagination::default());
        assert!(query.predicate.is_none());
        assert_eq!(
            query.geometry,
            Some(GeometryOutput {
                column: "geom".into(),
                srid: 4326
            })
        );
        assert!(assembled.count.predicate.is_none());
    }

    #[test]
    fn test_predicate_order() {
        let catalog = states();
        let request = ItemsRequest::default()
            .with_filter("population > 100")
            .with_bbox("0,0,1,1")
            .with_column_filter("state_abbr", "NY")
            .with_column_filter("not_a_column", "x");

        let assembled = assemble(&catalog, &request).unwrap();
        let predicate = assembled.query.predicate.unwrap();

        assert_eq!(
            predicate.fragment(),
            "(\"population\" > $1) AND (ST_Intersects(\"geom\", ST_SetSRID(ST_MakeBox2D(ST_GeomFromText($2), ST_GeomFromText($3)), 4326))) AND (\"state_abbr\" = $4)"
        );
        assert_eq!(predicate.param_count(), 4);
        assert_eq!(
            assembled.count.predicate.unwrap().parameters(),
            predicate.parameters()
        );
    }

    #[test]
    fn test_projection() {
        let catalog = states();
        let assembler = QueryAssembler::new(&catalog);

        let mut request = ItemsRequest::default();
        request.properties = "state_name, state_abbr".into();
        assert_eq!(
            assembler.assemble(&request).unwrap().query.columns,
            vec!["state_name", "state_abbr"]
        );

        request.properties = String::new();
        assert!(assembler.assemble(&request).unwrap().query.columns.is_empty());

        request.properties = "state_names".into();
        assert_eq!(
            assembler.assemble(&request).unwrap_err(),
            QueryError::unknown_column("state_names", "public.states")
        );
    }

    #[test]
    fn test_sort() {
        let catalog = states();
        let mut request = ItemsRequest::default();
        request.sortby = Some("population".into());
        request.sortdesc = 0;

        let query = assemble(&catalog, &request).unwrap().query;
        assert_eq!(query.order_by.column, "population");
        assert_eq!(query.order_by.direction, SortDirection::Desc);

        request.sortby = Some("nope".into());
        assert!(matches!(
            assemble(&catalog, &request),
            Err(QueryError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_filter_errors_propagate() {
        let catalog = states();
        let request = ItemsRequest::default().with_filter("state_name LI 'New York'");
        assert!(matches!(
            assemble(&catalog, &request),
            Err(QueryError::Filter(FilterError::Syntax { .. }))
        ));
    }

    #[test]
    fn test_tile_defaults() {
        let catalog = states();
        let key = TileKey::new(catalog.table().clone(), "WebMercatorQuad", 3, 2, 1);
        let tile = assemble_tile(&catalog, key, None, None, DEFAULT_MAX_FEATURES).unwrap();

        assert_eq!(tile.geometry_column, "geom");
        assert_eq!(tile.properties.len(), 4);
        assert_eq!(tile.layer_name, "public.states");
        assert!(tile.predicate.is_none());
    }

    #[test]
    fn test_tile_requires_geometry() {
        let catalog = Catalog::new(
            TableRef::new("public", "plain"),
            vec![ColumnInfo::numeric("gid")],
        );
        let key = TileKey::new(catalog.table().clone(), "WebMercatorQuad", 0, 0, 0);
        assert!(matches!(
            assemble_tile(&catalog, key, None, None, 10),
            Err(QueryError::MissingGeometryColumn(_))
        ));
    }

    #[test]
    fn test_item_by_id() {
        let catalog = states();
        let item = QueryAssembler::new(&catalog)
            .assemble_item("7", &ItemRequest::default())
            .unwrap();

        let predicate = item.predicate.unwrap();
        assert_eq!(predicate.fragment(), "\"gid\" = $1");
        assert_eq!(predicate.parameters(), &[Literal::Integer(7)]);
        assert_eq!(item.pagination, Pagination { limit: 1, offset: 0 });
        assert!(item.geometry.is_some());

        let request = ItemRequest {
            properties: "geom".into(),
            ..ItemRequest::default()
        };
        assert!(QueryAssembler::new(&catalog).assemble_item("7", &request).is_err());
    }

    #[test]
    fn test_closest_ignores_bbox_and_sort() {
        let catalog = states();
        let mut request = ClosestRequest::new(-82.9, 40.4);
        request.page = ItemsRequest::default()
            .with_bbox("0,0,1,1")
            .with_column_filter("state_abbr", "OH")
            .with_filter("population > 10");
        request.page.sortby = Some("population".into());

        let assembled = QueryAssembler::new(&catalog)
            .with_storage_srid(3857)
            .assemble_closest(&request)
            .unwrap();
        let query = assembled.query;

        assert_eq!(query.predicate.unwrap().fragment(), "\"population\" > $1");
        assert_eq!(query.order_by, OrderBy::asc("gid"));
        assert_eq!(
            query.nearest,
            Some(NearestTo {
                geometry_column: "geom".into(),
                storage_srid: 3857,
                longitude: -82.9,
                latitude: 40.4,
            })
        );

        let outside = ClosestRequest::new(200.0, 0.0);
        assert!(QueryAssembler::new(&catalog).assemble_closest(&outside).is_err());
    }

    #[test]
    fn test_statistics_validation() {
        use crate::query::{StatisticColumn, StatisticType};

        let catalog = states();
        let assembler = QueryAssembler::new(&catalog);
        let entry = |statistic, column: &str| StatisticColumn {
            statistic,
            column: column.into(),
            group_column: None,
            group_method: None,
        };

        let request = StatisticsRequest {
            aggregate_columns: vec![
                entry(StatisticType::Max, "state_name"),
                entry(StatisticType::Sum, "population"),
                entry(StatisticType::Sum, "population"),
            ],
            filter: None,
        };
        let query = assembler.statistics(&request).unwrap();
        assert_eq!(query.aggregates.unwrap().aggregates.len(), 2);
        assert!(query.distinct.is_empty());

        let sum_of_text = StatisticsRequest {
            aggregate_columns: vec![entry(StatisticType::Avg, "state_name")],
            filter: None,
        };
        assert!(assembler.statistics(&sum_of_text).is_err());

        let ungrouped = StatisticsRequest {
            aggregate_columns: vec![entry(StatisticType::Distinct, "state_abbr")],
            filter: None,
        };
        assert!(matches!(
            assembler.statistics(&ungrouped),
            Err(QueryError::InvalidParameter { .. })
        ));

        let too_many = StatisticsRequest {
            aggregate_columns: vec![entry(StatisticType::Count, "gid"); MAX_STATISTICS + 1],
            filter: None,
        };
        assert!(assembler.statistics(&too_many).is_err());
    }

    #[test]
    fn test_autocomplete_escapes_pattern() {
        let catalog = states();
        let assembler = QueryAssembler::new(&catalog);

        let query = assembler.autocomplete("state_name", "10%_a\\", 5).unwrap();
        assert_eq!(query.pattern, "%10\\%\\_a\\\\%");
        assert_eq!(query.limit, 5);

        assert!(assembler.autocomplete("population", "1", 5).is_err());
        assert!(assembler.autocomplete("nope", "1", 5).is_err());
    }

    #[test]
    fn test_bucket_count() {
        let catalog = states();
        let assembler = QueryAssembler::new(&catalog);
        let filter = assembler
            .compile_filter(Some("state_abbr = 'NY'"))
            .unwrap();

        let bounds = BucketBounds {
            min: 0.0,
            max: 10.0,
            lower_inclusive: true,
        };
        let count = assembler
            .bucket_count("population", &bounds, filter.as_ref())
            .unwrap();
        assert_eq!(
            count.predicate.unwrap().fragment(),
            "(\"state_abbr\" = $1) AND (\"population\" >= $2 AND \"population\" <= $3)"
        );

        assert!(assembler.bucket_count("state_name", &bounds, None).is_err());
    }
}
