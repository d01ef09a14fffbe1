//! # Statement Rendering
//!
//! Renders descriptors into PostgreSQL/PostGIS statements with `$n`
//! placeholders. Parameters are ordered by placeholder number.

use serde::Serialize;

use crate::catalog::{quote_ident, SchemaChange};
use crate::filter::{Literal, Predicate};

use super::descriptor::{
    AggregateQuery, AutocompleteQuery, BreakpointQuery, ColumnRangeQuery, CountDescriptor,
    DistinctQuery, ExtentQuery, NearestTo, QueryDescriptor, TileQuery,
};

/// Web Mercator, the SRID of tile envelopes
pub const TILE_SRID: u32 = 3857;

/// MVT extent in tile coordinate units
pub const TILE_EXTENT: u32 = 4096;

/// A rendered statement and its bound parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub text: String,
    pub parameters: Vec<Literal>,
}

impl Statement {
    fn new() -> Self {
        Self {
            text: String::new(),
            parameters: Vec::new(),
        }
    }

    fn push(&mut self, sql: &str) {
        self.text.push_str(sql);
    }

    /// Bind a parameter and append its placeholder
    fn bind(&mut self, literal: Literal) {
        self.parameters.push(literal);
        self.text.push('$');
        self.text.push_str(&self.parameters.len().to_string());
    }

    /// Append a predicate, numbering its slots after those already bound
    fn push_predicate(&mut self, predicate: &Predicate) {
        self.text.push_str(&predicate.render(self.parameters.len() + 1));
        self.parameters.extend_from_slice(predicate.parameters());
    }

    fn push_where(&mut self, predicate: Option<&Predicate>) {
        if let Some(predicate) = predicate {
            self.push(" WHERE ");
            self.push_predicate(predicate);
        }
    }

    /// WGS84 point built from bound coordinates
    fn push_point(&mut self, nearest: &NearestTo) {
        self.push("ST_SetSRID(ST_MakePoint(");
        self.bind(Literal::Float(nearest.longitude));
        self.push(", ");
        self.bind(Literal::Float(nearest.latitude));
        self.push("), 4326)");
    }
}

/// Descriptors that render to a single statement
pub trait ToStatement {
    fn to_statement(&self) -> Statement;
}

impl ToStatement for QueryDescriptor {
    fn to_statement(&self) -> Statement {
        let mut select = vec![quote_ident(&self.id_column)];
        for column in &self.columns {
            if *column != self.id_column {
                select.push(quote_ident(column));
            }
        }
        if let Some(geometry) = &self.geometry {
            select.push(format!(
                "ST_AsGeoJSON(ST_Transform({}, {}))::json AS geometry",
                quote_ident(&geometry.column),
                geometry.srid
            ));
        }

        let mut stmt = Statement::new();
        stmt.push(&format!("SELECT {}", select.join(", ")));
        if let Some(nearest) = &self.nearest {
            stmt.push(&format!(
                ", ST_Distance(ST_Transform({}, 4326)::geography, ",
                quote_ident(&nearest.geometry_column)
            ));
            stmt.push_point(nearest);
            stmt.push("::geography) / 1000 AS distance_in_kilometers");
        }
        stmt.push(&format!(" FROM {}", self.table.quoted()));
        stmt.push_where(self.predicate.as_ref());
        stmt.push(" ORDER BY ");
        if let Some(nearest) = &self.nearest {
            // KNN operator so a spatial index can serve the ordering
            stmt.push(&format!("{} <-> ST_Transform(", quote_ident(&nearest.geometry_column)));
            stmt.push_point(nearest);
            stmt.push(&format!(", {}), ", nearest.storage_srid));
        }
        stmt.push(&format!(
            "{} {} LIMIT ",
            quote_ident(&self.order_by.column),
            self.order_by.direction.as_sql()
        ));
        stmt.bind(Literal::Integer(clamp(self.pagination.limit)));
        stmt.push(" OFFSET ");
        stmt.bind(Literal::Integer(clamp(self.pagination.offset)));
        stmt
    }
}

impl ToStatement for CountDescriptor {
    fn to_statement(&self) -> Statement {
        let mut stmt = Statement::new();
        stmt.push(&format!("SELECT COUNT(*) AS count FROM {}", self.table.quoted()));
        stmt.push_where(self.predicate.as_ref());
        stmt
    }
}

impl ToStatement for TileQuery {
    fn to_statement(&self) -> Statement {
        let geom = format!("t.{}", quote_ident(&self.geometry_column));
        let properties: String = self
            .properties
            .iter()
            .map(|p| format!(", t.{}", quote_ident(p)))
            .collect();

        let mut stmt = Statement::new();
        stmt.push("SELECT ST_AsMVT(tile, ");
        stmt.bind(Literal::text(self.layer_name.clone()));
        stmt.push(&format!(
            ", {}, 'mvtgeom') FROM (WITH bounds AS (SELECT ST_TileEnvelope(",
            TILE_EXTENT
        ));
        stmt.bind(Literal::Integer(i64::from(self.key.zoom)));
        stmt.push(", ");
        stmt.bind(Literal::Integer(i64::from(self.key.row)));
        stmt.push(", ");
        stmt.bind(Literal::Integer(i64::from(self.key.column)));
        stmt.push(&format!(
            ") AS envelope) SELECT ST_AsMVTGeom(ST_Transform({geom}, {srid}), bounds.envelope, {extent}) AS mvtgeom{properties} FROM {table} AS t, bounds WHERE ST_Intersects(ST_Transform({geom}, {srid}), bounds.envelope)",
            geom = geom,
            srid = TILE_SRID,
            extent = TILE_EXTENT,
            properties = properties,
            table = self.key.table.quoted(),
        ));
        if let Some(predicate) = &self.predicate {
            stmt.push(" AND (");
            stmt.push_predicate(predicate);
            stmt.push(")");
        }
        stmt.push(" LIMIT ");
        stmt.bind(Literal::Integer(i64::from(self.max_features)));
        stmt.push(") AS tile");
        stmt
    }
}

impl ToStatement for ColumnRangeQuery {
    fn to_statement(&self) -> Statement {
        let column = quote_ident(&self.column);
        let mut stmt = Statement::new();
        stmt.push(&format!(
            "SELECT MIN({c}) AS min, MAX({c}) AS max FROM {t}",
            c = column,
            t = self.table.quoted()
        ));
        stmt.push_where(self.predicate.as_ref());
        stmt
    }
}

impl ToStatement for BreakpointQuery {
    fn to_statement(&self) -> Statement {
        let column = quote_ident(&self.column);
        let aggregate = if self.method.casts_to_integer() {
            format!("array_agg(CAST({} AS integer))", column)
        } else {
            format!("array_agg({})", column)
        };

        let mut stmt = Statement::new();
        stmt.push(&format!("SELECT {}({}, ", self.method.function_name(), aggregate));
        stmt.bind(Literal::Integer(i64::from(self.breaks)));
        stmt.push(&format!(") AS breaks FROM {}", self.table.quoted()));
        stmt.push_where(self.predicate.as_ref());
        stmt
    }
}

impl ToStatement for AggregateQuery {
    fn to_statement(&self) -> Statement {
        let select: Vec<String> = self
            .aggregates
            .iter()
            .map(|a| {
                format!(
                    "{}({}) AS {}",
                    a.function.as_str(),
                    quote_ident(&a.column),
                    quote_ident(&a.alias())
                )
            })
            .collect();

        let mut stmt = Statement::new();
        stmt.push(&format!(
            "SELECT {} FROM {}",
            select.join(", "),
            self.table.quoted()
        ));
        stmt.push_where(self.predicate.as_ref());
        stmt
    }
}

impl ToStatement for DistinctQuery {
    fn to_statement(&self) -> Statement {
        let column = quote_ident(&self.column);
        let method = self.group_method.as_str();
        let alias = quote_ident(method);

        let mut stmt = Statement::new();
        stmt.push(&format!(
            "SELECT {c}, {m}({g}) AS {a} FROM {t}",
            c = column,
            m = method,
            g = quote_ident(&self.group_column),
            a = alias,
            t = self.table.quoted()
        ));
        stmt.push_where(self.predicate.as_ref());
        stmt.push(&format!(" GROUP BY {} ORDER BY {} DESC", column, alias));
        stmt
    }
}

impl ToStatement for AutocompleteQuery {
    fn to_statement(&self) -> Statement {
        let column = quote_ident(&self.column);
        let mut stmt = Statement::new();
        stmt.push(&format!(
            "SELECT DISTINCT {c} FROM {t} WHERE {c} ILIKE ",
            c = column,
            t = self.table.quoted()
        ));
        stmt.bind(Literal::text(self.pattern.clone()));
        stmt.push(&format!(" ORDER BY {} LIMIT ", column));
        stmt.bind(Literal::Integer(clamp(self.limit)));
        stmt
    }
}

impl ToStatement for ExtentQuery {
    fn to_statement(&self) -> Statement {
        let mut stmt = Statement::new();
        stmt.push(&format!(
            "SELECT ST_XMin(e) AS minx, ST_YMin(e) AS miny, ST_XMax(e) AS maxx, ST_YMax(e) AS maxy FROM (SELECT ST_Extent(ST_Transform({}, 4326)) AS e FROM {}) AS extent",
            quote_ident(&self.geometry_column),
            self.table.quoted()
        ));
        stmt
    }
}

/// DDL takes no parameters; identifiers are quoted and types come from a
/// closed set
impl ToStatement for SchemaChange {
    fn to_statement(&self) -> Statement {
        let mut stmt = Statement::new();
        match self {
            SchemaChange::AddColumn {
                table,
                column,
                column_type,
            } => stmt.push(&format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                table.quoted(),
                quote_ident(column),
                column_type.as_sql()
            )),
            SchemaChange::DropColumn { table, column } => stmt.push(&format!(
                "ALTER TABLE {} DROP COLUMN IF EXISTS {}",
                table.quoted(),
                quote_ident(column)
            )),
        }
        stmt
    }
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
