//! Filter AST
//!
//! Output of the parser. Column references are unchecked here; the compiler
//! binds them against a catalog.

use super::literal::Literal;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    ILike,
}

impl ComparisonOp {
    /// SQL spelling of the operator
    pub fn as_sql(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::LtEq => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::GtEq => ">=",
            ComparisonOp::Like => "LIKE",
            ComparisonOp::ILike => "ILIKE",
        }
    }

    /// Pattern-match operators (text only)
    pub fn is_pattern(&self) -> bool {
        matches!(self, ComparisonOp::Like | ComparisonOp::ILike)
    }
}

/// Boolean combinators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// Spatial relationship predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialRelationship {
    Intersects,
    Disjoint,
    Contains,
    Within,
    Touches,
    Crosses,
    Overlaps,
    Equals,
}

impl SpatialRelationship {
    /// Match a filter keyword (case-insensitive)
    pub fn from_keyword(word: &str) -> Option<Self> {
        let rel = match word.to_ascii_uppercase().as_str() {
            "INTERSECTS" => SpatialRelationship::Intersects,
            "DISJOINT" => SpatialRelationship::Disjoint,
            "CONTAINS" => SpatialRelationship::Contains,
            "WITHIN" => SpatialRelationship::Within,
            "TOUCHES" => SpatialRelationship::Touches,
            "CROSSES" => SpatialRelationship::Crosses,
            "OVERLAPS" => SpatialRelationship::Overlaps,
            "EQUALS" => SpatialRelationship::Equals,
            _ => return None,
        };
        Some(rel)
    }

    /// PostGIS function implementing the relationship
    pub fn function_name(&self) -> &'static str {
        match self {
            SpatialRelationship::Intersects => "ST_Intersects",
            SpatialRelationship::Disjoint => "ST_Disjoint",
            SpatialRelationship::Contains => "ST_Contains",
            SpatialRelationship::Within => "ST_Within",
            SpatialRelationship::Touches => "ST_Touches",
            SpatialRelationship::Crosses => "ST_Crosses",
            SpatialRelationship::Overlaps => "ST_Overlaps",
            SpatialRelationship::Equals => "ST_Equals",
        }
    }
}

/// Parsed filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum FilterAst {
    /// `column <op> literal`
    Comparison {
        column: String,
        op: ComparisonOp,
        literal: Literal,
    },
    /// `column BETWEEN low AND high`
    Between {
        column: String,
        low: Literal,
        high: Literal,
    },
    /// `column IN (v1, v2, ...)`
    InList { column: String, values: Vec<Literal> },
    /// `column IS NULL`
    IsNull { column: String },
    /// AND/OR over any number of children; NOT over exactly one
    Logical {
        op: LogicalOp,
        children: Vec<FilterAst>,
    },
    /// `REL(column, <wkt>)`
    Spatial {
        relationship: SpatialRelationship,
        column: String,
        geometry: String,
    },
}

impl FilterAst {
    pub fn comparison(column: impl Into<String>, op: ComparisonOp, literal: Literal) -> Self {
        FilterAst::Comparison {
            column: column.into(),
            op,
            literal,
        }
    }

    pub fn not(child: FilterAst) -> Self {
        FilterAst::Logical {
            op: LogicalOp::Not,
            children: vec![child],
        }
    }

    /// Every column referenced, in traversal order
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterAst::Comparison { column, .. }
            | FilterAst::Between { column, .. }
            | FilterAst::InList { column, .. }
            | FilterAst::IsNull { column }
            | FilterAst::Spatial { column, .. } => out.push(column),
            FilterAst::Logical { children, .. } => {
                for child in children {
                    child.collect_columns(out);
                }
            }
        }
    }

    /// Number of literal values in the tree (each becomes one parameter)
    pub fn literal_count(&self) -> usize {
        match self {
            FilterAst::Comparison { .. } | FilterAst::Spatial { .. } => 1,
            FilterAst::Between { .. } => 2,
            FilterAst::InList { values, .. } => values.len(),
            FilterAst::IsNull { .. } => 0,
            FilterAst::Logical { children, .. } => {
                children.iter().map(FilterAst::literal_count).sum()
            }
        }
    }
}
