//! Filter compiler
//!
//! Binds a parsed filter against a catalog snapshot and emits a
//! [`Predicate`]. Every literal becomes a parameter slot; identifiers are
//! always quoted.

use crate::catalog::{quote_ident, Catalog, ColumnInfo, ColumnKind};

use super::ast::{ComparisonOp, FilterAst, LogicalOp, SpatialRelationship};
use super::errors::{FilterError, FilterResult};
use super::literal::Literal;
use super::parser::parse;
use super::predicate::Predicate;

/// SRID assumed for filter geometries unless configured otherwise
pub const DEFAULT_SRID: u32 = 4326;

/// Compiles filter ASTs against one catalog snapshot
#[derive(Debug, Clone, Copy)]
pub struct FilterCompiler<'a> {
    catalog: &'a Catalog,
    srid: u32,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            srid: DEFAULT_SRID,
        }
    }

    /// SRID of geometry literals in spatial predicates
    pub fn with_srid(mut self, srid: u32) -> Self {
        self.srid = srid;
        self
    }

    pub fn compile(&self, ast: &FilterAst) -> FilterResult<Predicate> {
        match ast {
            FilterAst::Comparison {
                column,
                op,
                literal,
            } => {
                let info = self.scalar_column(column)?;
                if op.is_pattern() && info.kind != ColumnKind::Text {
                    return Err(mismatch(info, "text"));
                }
                check_literal(info, literal)?;

                let mut p = Predicate::empty();
                p.push_sql(&format!("{} {} ", quote_ident(column), op.as_sql()));
                p.push_param(bind(info, literal));
                Ok(p)
            }

            FilterAst::Between { column, low, high } => {
                let info = self.scalar_column(column)?;
                check_literal(info, low)?;
                check_literal(info, high)?;

                let mut p = Predicate::empty();
                p.push_sql(&format!("{} BETWEEN ", quote_ident(column)));
                p.push_param(bind(info, low));
                p.push_sql(" AND ");
                p.push_param(bind(info, high));
                Ok(p)
            }

            FilterAst::InList { column, values } => {
                let info = self.scalar_column(column)?;
                for value in values {
                    check_literal(info, value)?;
                }

                let mut p = Predicate::empty();
                p.push_sql(&format!("{} IN (", quote_ident(column)));
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        p.push_sql(", ");
                    }
                    p.push_param(bind(info, value));
                }
                p.push_sql(")");
                Ok(p)
            }

            FilterAst::IsNull { column } => {
                self.column(column)?;
                Ok(Predicate::raw(format!("{} IS NULL", quote_ident(column))))
            }

            FilterAst::Logical { op, children } => {
                let compiled = children
                    .iter()
                    .map(|child| self.compile(child))
                    .collect::<FilterResult<Vec<_>>>()?;

                Ok(match op {
                    LogicalOp::And => Predicate::all(compiled),
                    LogicalOp::Or => Predicate::any(compiled),
                    LogicalOp::Not => Predicate::all(compiled).not(),
                })
            }

            FilterAst::Spatial {
                relationship,
                column,
                geometry,
            } => {
                let info = self.column(column)?;
                if info.kind != ColumnKind::Geometry {
                    return Err(mismatch(info, "geometry"));
                }
                Ok(self.spatial(*relationship, column, geometry))
            }
        }
    }

    fn spatial(&self, relationship: SpatialRelationship, column: &str, wkt: &str) -> Predicate {
        let mut p = Predicate::empty();
        p.push_sql(&format!(
            "{}({}, ST_GeomFromText(",
            relationship.function_name(),
            quote_ident(column)
        ));
        p.push_param(Literal::Geometry(wkt.to_string()));
        p.push_sql(&format!(", {}))", self.srid));
        p
    }

    fn column(&self, name: &str) -> FilterResult<&'a ColumnInfo> {
        self.catalog
            .get(name)
            .ok_or_else(|| FilterError::unknown_column(name, self.catalog.table()))
    }

    /// A column usable by non-spatial comparisons
    fn scalar_column(&self, name: &str) -> FilterResult<&'a ColumnInfo> {
        let info = self.column(name)?;
        if info.kind == ColumnKind::Geometry {
            return Err(mismatch(info, "non-geometry"));
        }
        Ok(info)
    }
}

fn mismatch(info: &ColumnInfo, expected: &'static str) -> FilterError {
    FilterError::TypeMismatch {
        column: info.name.clone(),
        expected,
        found: info.kind,
    }
}

fn check_literal(info: &ColumnInfo, literal: &Literal) -> FilterResult<()> {
    match literal {
        l if l.is_numeric() && info.kind != ColumnKind::Numeric => Err(mismatch(info, "numeric")),
        Literal::Boolean(_) if info.kind != ColumnKind::Boolean => Err(mismatch(info, "boolean")),
        _ => Ok(()),
    }
}

/// Text literals take the column's kind, the same way request values do
fn bind(info: &ColumnInfo, literal: &Literal) -> Literal {
    match literal {
        Literal::Text(raw) => Literal::coerce(raw, info.kind),
        other => other.clone(),
    }
}

/// Compile an AST with the default SRID
pub fn compile(ast: &FilterAst, catalog: &Catalog) -> FilterResult<Predicate> {
    FilterCompiler::new(catalog).compile(ast)
}

/// Parse and compile filter text
pub fn compile_text(text: &str, catalog: &Catalog) -> FilterResult<Predicate> {
    compile(&parse(text)?, catalog)
}

/// Equality predicate for a raw request value, coerced by column kind
pub fn column_equals(info: &ColumnInfo, raw: &str) -> Predicate {
    let mut p = Predicate::empty();
    p.push_sql(&format!("{} {} ", quote_ident(&info.name), ComparisonOp::Eq.as_sql()));
    p.push_param(Literal::coerce(raw, info.kind));
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableRef;

    fn states() -> Catalog {
        Catalog::new(
            TableRef::new("public", "states"),
            vec![
                ColumnInfo::numeric("gid"),
                ColumnInfo::text("state_name"),
                ColumnInfo::text("state_abbr"),
                ColumnInfo::numeric("population"),
                ColumnInfo::new("coastal", ColumnKind::Boolean),
                ColumnInfo::geometry("geom"),
            ],
        )
    }

    #[test]
    fn test_equality_is_parameterized() {
        let p = compile_text("state_name='New York'", &states()).unwrap();
        assert_eq!(p.fragment(), "\"state_name\" = $1");
        assert_eq!(p.parameters(), &[Literal::text("New York")]);
        assert!(!p.fragment().contains("New York"));
    }

    #[test]
    fn test_unknown_column() {
        let err = compile_text("state_names='New York'", &states()).unwrap_err();
        assert_eq!(
            err,
            FilterError::unknown_column("state_names", "public.states")
        );
    }

    #[test]
    fn test_logical_composition() {
        let p = compile_text(
            "state_abbr IN ('NY', 'OH') AND NOT population BETWEEN 10 AND 20",
            &states(),
        )
        .unwrap();
        assert_eq!(
            p.fragment(),
            "(\"state_abbr\" IN ($1, $2)) AND (NOT (\"population\" BETWEEN $3 AND $4))"
        );
        assert_eq!(p.param_count(), 4);
    }

    #[test]
    fn test_spatial_uses_srid() {
        let catalog = states();
        let ast = parse("INTERSECTS(geom, POINT(1 2))").unwrap();
        let p = FilterCompiler::new(&catalog)
            .with_srid(3857)
            .compile(&ast)
            .unwrap();
        assert_eq!(
            p.fragment(),
            "ST_Intersects(\"geom\", ST_GeomFromText($1, 3857))"
        );
        assert_eq!(p.parameters(), &[Literal::Geometry("POINT(1 2)".into())]);
    }

    #[test]
    fn test_type_mismatches() {
        let catalog = states();
        for text in [
            "state_name = 5",
            "population LIKE '1%'",
            "state_name = TRUE",
            "geom = 'x'",
            "INTERSECTS(state_name, POINT(1 2))",
        ] {
            let err = compile_text(text, &catalog).unwrap_err();
            assert!(
                matches!(err, FilterError::TypeMismatch { .. }),
                "expected mismatch for {:?}, got {:?}",
                text,
                err
            );
        }
    }

    #[test]
    fn test_is_null_allowed_on_geometry() {
        let p = compile_text("geom IS NULL", &states()).unwrap();
        assert_eq!(p.fragment(), "\"geom\" IS NULL");
        assert_eq!(p.param_count(), 0);
    }

    #[test]
    fn test_text_literal_on_numeric_column_passes() {
        assert!(compile_text("population = '5'", &states()).is_ok());
        assert!(compile_text("coastal = FALSE", &states()).is_ok());
    }

    #[test]
    fn test_text_literal_takes_column_kind() {
        let catalog = states();
        let p = compile_text("population = '5'", &catalog).unwrap();
        assert_eq!(p.parameters(), &[Literal::Integer(5)]);
        assert_eq!(
            p.parameters(),
            column_equals(catalog.get("population").unwrap(), "5").parameters()
        );

        let p = compile_text("coastal IN ('t', 'false')", &catalog).unwrap();
        assert_eq!(
            p.parameters(),
            &[Literal::Boolean(true), Literal::Boolean(false)]
        );

        // Unparseable text stays text for storage to reject
        let p = compile_text("population BETWEEN 'low' AND 10", &catalog).unwrap();
        assert_eq!(p.parameters(), &[Literal::text("low"), Literal::Integer(10)]);

        let p = compile_text("state_abbr = '42'", &catalog).unwrap();
        assert_eq!(p.parameters(), &[Literal::text("42")]);
    }

    #[test]
    fn test_column_equals_coerces() {
        let catalog = states();
        let p = column_equals(catalog.get("population").unwrap(), "42");
        assert_eq!(p.fragment(), "\"population\" = $1");
        assert_eq!(p.parameters(), &[Literal::Integer(42)]);
    }
}
