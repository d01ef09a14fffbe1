//! Bounding box parameter

use std::str::FromStr;

use crate::catalog::quote_ident;
use crate::filter::{Literal, Predicate};

use super::errors::{QueryError, QueryResult};

/// `minx,miny,maxx,maxy`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl BoundingBox {
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> QueryResult<Self> {
        let bbox = Self {
            minx,
            miny,
            maxx,
            maxy,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    fn validate(&self) -> QueryResult<()> {
        let all = [self.minx, self.miny, self.maxx, self.maxy];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(QueryError::InvalidBoundingBox(
                "coordinates must be finite".to_string(),
            ));
        }
        if self.minx > self.maxx || self.miny > self.maxy {
            return Err(QueryError::InvalidBoundingBox(
                "minimum exceeds maximum".to_string(),
            ));
        }
        Ok(())
    }

    /// Lower-left and upper-right corners as WKT points
    pub fn corners(&self) -> (String, String) {
        (
            format!("POINT({} {})", self.minx, self.miny),
            format!("POINT({} {})", self.maxx, self.maxy),
        )
    }

    /// Envelope intersection against `geometry_column`; both corners bound
    pub fn predicate(&self, geometry_column: &str, srid: u32) -> Predicate {
        let (lower, upper) = self.corners();

        let mut p = Predicate::empty();
        p.push_sql(&format!(
            "ST_Intersects({}, ST_SetSRID(ST_MakeBox2D(ST_GeomFromText(",
            quote_ident(geometry_column)
        ));
        p.push_param(Literal::Geometry(lower));
        p.push_sql("), ST_GeomFromText(");
        p.push_param(Literal::Geometry(upper));
        p.push_sql(&format!(")), {}))", srid));
        p
    }
}

impl FromStr for BoundingBox {
    type Err = QueryError;

    fn from_str(s: &str) -> QueryResult<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(QueryError::InvalidBoundingBox(format!(
                "expected 4 comma separated numbers, got {}",
                parts.len()
            )));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| QueryError::InvalidBoundingBox(format!("not a number: {}", part)))?;
        }

        BoundingBox::new(values[0], values[1], values[2], values[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let bbox: BoundingBox = "-120.5, 30, -100, 45.25".parse().unwrap();
        assert_eq!(bbox, BoundingBox::new(-120.5, 30.0, -100.0, 45.25).unwrap());
        assert_eq!(
            bbox.corners(),
            ("POINT(-120.5 30)".to_string(), "POINT(-100 45.25)".to_string())
        );
    }

    #[test]
    fn test_parse_errors() {
        for text in ["1,2,3", "1,2,3,4,5", "a,2,3,4", "5,0,1,1", "0,0,NaN,1", ""] {
            assert!(
                matches!(
                    text.parse::<BoundingBox>(),
                    Err(QueryError::InvalidBoundingBox(_))
                ),
                "{:?}",
                text
            );
        }
    }

    #[test]
    fn test_predicate_binds_corners() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let p = bbox.predicate("geom", 4326);
        assert_eq!(
            p.fragment(),
            "ST_Intersects(\"geom\", ST_SetSRID(ST_MakeBox2D(ST_GeomFromText($1), ST_GeomFromText($2)), 4326))"
        );
        assert_eq!(
            p.parameters(),
            &[
                Literal::Geometry("POINT(0 0)".into()),
                Literal::Geometry("POINT(10 10)".into()),
            ]
        );
    }
}
