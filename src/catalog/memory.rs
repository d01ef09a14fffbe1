//! # In-Memory Column Catalog
//!
//! Catalog held in process memory. Used by the CLI (loaded from a JSON
//! catalog file) and by tests standing in for the storage collaborator.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::errors::{CatalogError, CatalogResult};
use super::schema::SchemaChange;
use super::types::{ColumnCatalog, ColumnInfo, ColumnKind, TableRef};

/// On-disk catalog file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub tables: Vec<CatalogFileTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFileTable {
    pub schema: String,
    pub name: String,
    pub columns: Vec<CatalogFileColumn>,
}

/// A column entry; `data_type` is a PostgreSQL type name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFileColumn {
    pub name: String,
    pub data_type: String,
}

/// Thread-safe in-memory catalog
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: RwLock<HashMap<TableRef, Vec<ColumnInfo>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON catalog file
    pub fn load(path: &Path) -> CatalogResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CatalogError::LoadFailed(format!("{}: {}", path.display(), e))
        })?;

        let file: CatalogFile = serde_json::from_str(&content)
            .map_err(|e| CatalogError::LoadFailed(format!("Invalid catalog JSON: {}", e)))?;

        let catalog = Self::new();
        for table in file.tables {
            let columns = table
                .columns
                .into_iter()
                .map(|c| ColumnInfo::new(c.name, ColumnKind::from_data_type(&c.data_type)))
                .collect();
            catalog.register(TableRef::new(table.schema, table.name), columns)?;
        }

        Ok(catalog)
    }

    /// Register (or replace) a table's columns
    pub fn register(&self, table: TableRef, columns: Vec<ColumnInfo>) -> CatalogResult<()> {
        let mut tables = self.write()?;
        tables.insert(table, columns);
        Ok(())
    }

    /// Append a column to an existing table
    pub fn add_column(&self, table: &TableRef, column: ColumnInfo) -> CatalogResult<()> {
        let mut tables = self.write()?;
        let columns = tables
            .get_mut(table)
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))?;
        columns.retain(|c| c.name != column.name);
        columns.push(column);
        Ok(())
    }

    /// Remove a column if present
    pub fn drop_column(&self, table: &TableRef, name: &str) -> CatalogResult<()> {
        let mut tables = self.write()?;
        let columns = tables
            .get_mut(table)
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))?;
        columns.retain(|c| c.name != name);
        Ok(())
    }

    fn write(
        &self,
    ) -> CatalogResult<std::sync::RwLockWriteGuard<'_, HashMap<TableRef, Vec<ColumnInfo>>>> {
        self.tables
            .write()
            .map_err(|_| CatalogError::Unavailable("catalog lock poisoned".into()))
    }
}

impl ColumnCatalog for MemoryCatalog {
    fn list_columns(&self, table: &TableRef) -> CatalogResult<Vec<ColumnInfo>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| CatalogError::Unavailable("catalog lock poisoned".into()))?;

        tables
            .get(table)
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))
    }

    fn apply_change(&self, change: &SchemaChange) -> CatalogResult<()> {
        match change {
            SchemaChange::AddColumn {
                table,
                column,
                column_type,
            } => self.add_column(table, ColumnInfo::new(column.clone(), column_type.kind())),
            SchemaChange::DropColumn { table, column } => self.drop_column(table, column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn states() -> TableRef {
        TableRef::new("public", "states")
    }

    #[test]
    fn test_register_and_list() {
        let catalog = MemoryCatalog::new();
        catalog
            .register(states(), vec![ColumnInfo::numeric("gid"), ColumnInfo::text("state_name")])
            .unwrap();

        let columns = catalog.list_columns(&states()).unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[1].name, "state_name");
    }

    #[test]
    fn test_unknown_table() {
        let catalog = MemoryCatalog::new();
        let result = catalog.list_columns(&states());
        assert!(matches!(result, Err(CatalogError::TableNotFound(_))));
    }

    #[test]
    fn test_schema_mutations() {
        let catalog = MemoryCatalog::new();
        catalog.register(states(), vec![ColumnInfo::numeric("gid")]).unwrap();

        catalog.add_column(&states(), ColumnInfo::text("abbr")).unwrap();
        assert!(catalog.snapshot(&states()).unwrap().contains("abbr"));

        catalog.drop_column(&states(), "abbr").unwrap();
        assert!(!catalog.snapshot(&states()).unwrap().contains("abbr"));
    }

    #[test]
    fn test_apply_change() {
        use crate::catalog::ColumnType;

        let catalog = MemoryCatalog::new();
        catalog.register(states(), vec![ColumnInfo::numeric("gid")]).unwrap();

        catalog
            .apply_change(&SchemaChange::AddColumn {
                table: states(),
                column: "median_age".into(),
                column_type: ColumnType::DoublePrecision,
            })
            .unwrap();
        let snapshot = catalog.snapshot(&states()).unwrap();
        assert_eq!(snapshot.get("median_age").unwrap().kind, ColumnKind::Numeric);

        catalog
            .apply_change(&SchemaChange::DropColumn {
                table: states(),
                column: "median_age".into(),
            })
            .unwrap();
        assert!(!catalog.snapshot(&states()).unwrap().contains("median_age"));

        let missing = catalog.apply_change(&SchemaChange::DropColumn {
            table: TableRef::new("public", "nope"),
            column: "x".into(),
        });
        assert!(matches!(missing, Err(CatalogError::TableNotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalog.json");
        fs::write(
            &path,
            r#"{"tables":[{"schema":"public","name":"states","columns":[
                {"name":"gid","data_type":"integer"},
                {"name":"state_name","data_type":"text"},
                {"name":"geom","data_type":"geometry"}]}]}"#,
        )
        .unwrap();

        let catalog = MemoryCatalog::load(&path).unwrap();
        let snapshot = catalog.snapshot(&states()).unwrap();
        assert_eq!(snapshot.get("gid").unwrap().kind, ColumnKind::Numeric);
        assert_eq!(snapshot.geometry_column().unwrap().name, "geom");
    }
}
