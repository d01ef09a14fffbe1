//! Schema changes
//!
//! Column additions and removals. Storage applies a change first, then the
//! catalog mirrors it.

use serde::{Deserialize, Serialize};

use super::types::{ColumnKind, TableRef};

/// Column types accepted for a new column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "bigint")]
    BigInt,
    #[serde(rename = "double precision")]
    DoublePrecision,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "time")]
    Time,
    #[serde(rename = "uuid")]
    Uuid,
}

impl ColumnType {
    /// PostgreSQL type name
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::BigInt => "bigint",
            ColumnType::DoublePrecision => "double precision",
            ColumnType::Boolean => "boolean",
            ColumnType::Time => "time",
            ColumnType::Uuid => "uuid",
        }
    }

    pub fn kind(&self) -> ColumnKind {
        ColumnKind::from_data_type(self.as_sql())
    }
}

/// One column-level change to a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    AddColumn {
        table: TableRef,
        column: String,
        column_type: ColumnType,
    },
    /// Dropping an absent column is not an error
    DropColumn { table: TableRef, column: String },
}

impl SchemaChange {
    pub fn table(&self) -> &TableRef {
        match self {
            SchemaChange::AddColumn { table, .. } | SchemaChange::DropColumn { table, .. } => table,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            SchemaChange::AddColumn { column, .. } | SchemaChange::DropColumn { column, .. } => {
                column
            }
        }
    }
}
