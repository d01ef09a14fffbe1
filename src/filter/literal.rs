//! Literal values carried by filters and bound as statement parameters.

use std::fmt;

use serde::Serialize;

use crate::catalog::ColumnKind;

/// A literal value; always bound as a parameter, never inlined into SQL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// Well-known-text geometry
    Geometry(String),
}

impl Literal {
    pub fn text(value: impl Into<String>) -> Self {
        Literal::Text(value.into())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Literal::Integer(_) | Literal::Float(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Boolean(_) => "boolean",
            Literal::Integer(_) => "integer",
            Literal::Float(_) => "float",
            Literal::Text(_) => "text",
            Literal::Geometry(_) => "geometry",
        }
    }

    /// Coerce a raw request value according to the target column's kind.
    ///
    /// Values that do not parse as the column's kind stay text and are left
    /// for storage to reject.
    pub fn coerce(raw: &str, kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Numeric => {
                if let Ok(i) = raw.parse::<i64>() {
                    Literal::Integer(i)
                } else if let Ok(f) = raw.parse::<f64>() {
                    if f.is_finite() {
                        Literal::Float(f)
                    } else {
                        Literal::text(raw)
                    }
                } else {
                    Literal::text(raw)
                }
            }
            ColumnKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Literal::Boolean(true),
                "false" | "f" | "0" => Literal::Boolean(false),
                _ => Literal::text(raw),
            },
            _ => Literal::text(raw),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Text(s) | Literal::Geometry(s) => f.write_str(s),
        }
    }
}
