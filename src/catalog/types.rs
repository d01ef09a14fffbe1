//! Catalog types
//!
//! Table identities, column type tags and the per-request catalog snapshot
//! consumed by the filter compiler and query assembler.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{CatalogError, CatalogResult};
use super::schema::SchemaChange;

/// PostgreSQL data types reported as numeric columns
pub const NUMERIC_DATA_TYPES: &[&str] = &[
    "bigint",
    "bigserial",
    "double precision",
    "integer",
    "smallint",
    "real",
    "smallserial",
    "serial",
    "numeric",
    "money",
];

/// Identity of a table in the storage collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Fully quoted identifier, e.g. `"public"."states"`
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl FromStr for TableRef {
    type Err = CatalogError;

    /// Parses `schema.table`; the first `.` separates the two parts.
    fn from_str(s: &str) -> CatalogResult<Self> {
        match s.split_once('.') {
            Some((schema, name)) if !schema.is_empty() && !name.is_empty() => {
                Ok(TableRef::new(schema, name))
            }
            _ => Err(CatalogError::InvalidTable(s.to_string())),
        }
    }
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Semantic type tag of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Text,
    Boolean,
    Temporal,
    Geometry,
}

impl ColumnKind {
    /// Map a PostgreSQL `information_schema` data type to a kind
    pub fn from_data_type(data_type: &str) -> Self {
        let data_type = data_type.trim().to_ascii_lowercase();

        if NUMERIC_DATA_TYPES.contains(&data_type.as_str()) {
            return ColumnKind::Numeric;
        }

        match data_type.as_str() {
            "boolean" => ColumnKind::Boolean,
            "date" | "interval" => ColumnKind::Temporal,
            t if t.starts_with("timestamp") || t.starts_with("time") => ColumnKind::Temporal,
            "geometry" | "geography" | "user-defined" => ColumnKind::Geometry,
            _ => ColumnKind::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Text => "text",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Temporal => "temporal",
            ColumnKind::Geometry => "geometry",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Numeric)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A known column and its type tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Numeric)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    pub fn geometry(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Geometry)
    }
}

/// Column catalog adapter supplied by the storage collaborator
pub trait ColumnCatalog: Send + Sync {
    /// Ordered columns of `table`
    fn list_columns(&self, table: &TableRef) -> CatalogResult<Vec<ColumnInfo>>;

    /// Take an immutable snapshot for one request
    fn snapshot(&self, table: &TableRef) -> CatalogResult<Catalog> {
        Ok(Catalog::new(table.clone(), self.list_columns(table)?))
    }

    /// Mirror a change storage has already applied. Catalogs that list the
    /// live store see it on their next listing and keep this default.
    fn apply_change(&self, _change: &SchemaChange) -> CatalogResult<()> {
        Ok(())
    }
}

/// Immutable per-request view of one table's columns
#[derive(Debug, Clone)]
pub struct Catalog {
    table: TableRef,
    columns: Vec<ColumnInfo>,
}

impl Catalog {
    pub fn new(table: TableRef, columns: Vec<ColumnInfo>) -> Self {
        Self { table, columns }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Look up a column by exact (case-sensitive) name
    pub fn get(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// First geometry column, if the table has one
    pub fn geometry_column(&self) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.kind == ColumnKind::Geometry)
    }

    /// Every non-geometry column, in catalog order
    pub fn property_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| c.kind != ColumnKind::Geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ref_parse() {
        let table: TableRef = "public.states".parse().unwrap();
        assert_eq!(table.schema, "public");
        assert_eq!(table.name, "states");
        assert_eq!(table.to_string(), "public.states");

        let dotted: TableRef = "public.us.states".parse().unwrap();
        assert_eq!(dotted.name, "us.states");

        assert!("states".parse::<TableRef>().is_err());
        assert!(".states".parse::<TableRef>().is_err());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("state_name"), "\"state_name\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(
            TableRef::new("public", "states").quoted(),
            "\"public\".\"states\""
        );
    }

    #[test]
    fn test_kind_from_data_type() {
        assert_eq!(ColumnKind::from_data_type("double precision"), ColumnKind::Numeric);
        assert_eq!(ColumnKind::from_data_type("integer"), ColumnKind::Numeric);
        assert_eq!(ColumnKind::from_data_type("boolean"), ColumnKind::Boolean);
        assert_eq!(
            ColumnKind::from_data_type("timestamp without time zone"),
            ColumnKind::Temporal
        );
        assert_eq!(ColumnKind::from_data_type("USER-DEFINED"), ColumnKind::Geometry);
        assert_eq!(ColumnKind::from_data_type("character varying"), ColumnKind::Text);
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = Catalog::new(
            TableRef::new("public", "states"),
            vec![
                ColumnInfo::numeric("gid"),
                ColumnInfo::text("state_name"),
                ColumnInfo::geometry("geom"),
            ],
        );

        assert!(catalog.contains("state_name"));
        assert!(!catalog.contains("State_Name"));
        assert_eq!(catalog.geometry_column().map(|c| c.name.as_str()), Some("geom"));
        assert_eq!(catalog.property_columns().count(), 2);
    }
}
