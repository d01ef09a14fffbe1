//! # Items Request Parameters
//!
//! Parses feature-page parameters from a query string map (GET) or a JSON
//! body (POST). Keys that are not reserved become implicit column-equality
//! filters; the assembler decides which of them name real columns.
//!
//! Single-item, nearest-feature and statistics requests live here too.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::descriptor::{AggregateFunction, SortDirection, DEFAULT_LIMIT, DEFAULT_OUTPUT_SRID};
use super::errors::{QueryError, QueryResult};

/// Parameter names with a fixed meaning
pub const RESERVED_PARAMS: &[&str] = &[
    "bbox",
    "limit",
    "offset",
    "properties",
    "sortby",
    "sortdesc",
    "filter",
    "cql_filter",
    "srid",
    "return_geometry",
];

/// Parsed items request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemsRequest {
    /// Raw `minx,miny,maxx,maxy`
    pub bbox: Option<String>,
    pub limit: u64,
    pub offset: u64,
    /// `*`, empty, or a comma separated allow-list
    pub properties: String,
    /// Sort column; the surrogate key when unset
    pub sortby: Option<String>,
    /// `1` ascending, anything else descending
    pub sortdesc: i64,
    #[serde(alias = "cql_filter")]
    pub filter: Option<String>,
    pub srid: u32,
    pub return_geometry: bool,
    /// Non-reserved parameters, candidate column-equality filters
    #[serde(skip)]
    pub column_filters: BTreeMap<String, String>,
}

impl Default for ItemsRequest {
    fn default() -> Self {
        Self {
            bbox: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
            properties: "*".to_string(),
            sortby: None,
            sortdesc: 1,
            filter: None,
            srid: DEFAULT_OUTPUT_SRID,
            return_geometry: true,
            column_filters: BTreeMap::new(),
        }
    }
}

impl ItemsRequest {
    /// Parse query string parameters
    pub fn parse(params: &HashMap<String, String>) -> QueryResult<Self> {
        let mut result = ItemsRequest::default();

        for (key, value) in params {
            match key.as_str() {
                "bbox" => result.bbox = non_empty(value),
                "sortby" => result.sortby = non_empty(value),
                "sortdesc" => result.sortdesc = parse_number("sortdesc", value)?,
                _ => {
                    if !result.apply_page_param(key, value)? {
                        result.column_filters.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        Ok(result)
    }

    /// Paging, projection, filter and geometry output; `false` when `key`
    /// is none of these
    fn apply_page_param(&mut self, key: &str, value: &str) -> QueryResult<bool> {
        match key {
            "limit" => self.limit = parse_number("limit", value)?,
            "offset" => self.offset = parse_number("offset", value)?,
            "properties" => self.properties = value.to_string(),
            "filter" | "cql_filter" => self.filter = non_empty(value),
            "srid" => self.srid = parse_number("srid", value)?,
            "return_geometry" => self.return_geometry = parse_bool("return_geometry", value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_bbox(mut self, bbox: impl Into<String>) -> Self {
        self.bbox = Some(bbox.into());
        self
    }

    pub fn with_column_filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.column_filters.insert(column.into(), value.into());
        self
    }

    pub fn with_page(mut self, limit: u64, offset: u64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn direction(&self) -> SortDirection {
        SortDirection::from_sortdesc(self.sortdesc)
    }
}

/// Single feature by surrogate key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemRequest {
    pub properties: String,
    pub srid: u32,
    pub return_geometry: bool,
}

impl Default for ItemRequest {
    fn default() -> Self {
        Self {
            properties: "*".to_string(),
            srid: DEFAULT_OUTPUT_SRID,
            return_geometry: true,
        }
    }
}

impl ItemRequest {
    /// Parse query string parameters; other keys are ignored
    pub fn parse(params: &HashMap<String, String>) -> QueryResult<Self> {
        let mut result = ItemRequest::default();
        if let Some(properties) = params.get("properties") {
            result.properties = properties.clone();
        }
        if let Some(srid) = params.get("srid") {
            result.srid = parse_number("srid", srid)?;
        }
        if let Some(flag) = params.get("return_geometry") {
            result.return_geometry = parse_bool("return_geometry", flag)?;
        }
        Ok(result)
    }
}

/// Features nearest to a WGS84 point
#[derive(Debug, Clone, PartialEq)]
pub struct ClosestRequest {
    pub longitude: f64,
    pub latitude: f64,
    /// Paging, projection, filter and geometry output. Bounding box, sort
    /// and column filters do not apply.
    pub page: ItemsRequest,
}

impl ClosestRequest {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
            page: ItemsRequest::default(),
        }
    }

    /// Parse query string parameters; `latitude` and `longitude` are required
    pub fn parse(params: &HashMap<String, String>) -> QueryResult<Self> {
        let coordinate = |name: &str| -> QueryResult<f64> {
            let raw = params
                .get(name)
                .ok_or_else(|| QueryError::invalid_parameter(name, "required"))?;
            parse_number(name, raw)
        };

        let mut result = ClosestRequest::new(coordinate("longitude")?, coordinate("latitude")?);
        for (key, value) in params {
            result.page.apply_page_param(key, value)?;
        }
        result.validate()?;
        Ok(result)
    }

    pub fn validate(&self) -> QueryResult<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(QueryError::invalid_parameter(
                "latitude",
                format!("{} is outside -90..90", self.latitude),
            ));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(QueryError::invalid_parameter(
                "longitude",
                format!("{} is outside -180..180", self.longitude),
            ));
        }
        Ok(())
    }
}

/// Statistic requested for one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatisticType {
    /// Distinct values grouped with an aggregate of another column
    Distinct,
    Avg,
    Count,
    Sum,
    Max,
    Min,
}

impl StatisticType {
    /// The single-row aggregate, `None` for `distinct`
    pub fn aggregate(&self) -> Option<AggregateFunction> {
        match self {
            StatisticType::Distinct => None,
            StatisticType::Avg => Some(AggregateFunction::Avg),
            StatisticType::Count => Some(AggregateFunction::Count),
            StatisticType::Sum => Some(AggregateFunction::Sum),
            StatisticType::Max => Some(AggregateFunction::Max),
            StatisticType::Min => Some(AggregateFunction::Min),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticColumn {
    #[serde(rename = "type")]
    pub statistic: StatisticType,
    pub column: String,
    /// Required for `distinct`
    #[serde(default)]
    pub group_column: Option<String>,
    /// Required for `distinct`
    #[serde(default)]
    pub group_method: Option<AggregateFunction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsRequest {
    pub aggregate_columns: Vec<StatisticColumn>,
    #[serde(default, alias = "cql_filter")]
    pub filter: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> QueryResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| QueryError::invalid_parameter(name, format!("not a valid number: {}", value)))
}

fn parse_bool(name: &str, value: &str) -> QueryResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(QueryError::invalid_parameter(
            name,
            format!("not a boolean: {}", value),
        )),
    }
}
