//! Parameterized predicates
//!
//! A predicate is a run of SQL text interleaved with parameter slots. Slots
//! are indices into the predicate's own parameter list, so composing two
//! predicates only shifts the right-hand slots; `$n` numbers are assigned at
//! render time.

use super::literal::Literal;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Sql(String),
    /// Index into `Predicate::parameters`
    Param(usize),
}

/// A boolean SQL fragment with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    segments: Vec<Segment>,
    parameters: Vec<Literal>,
}

impl Predicate {
    /// Constant SQL with no parameters
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Sql(sql.into())],
            parameters: Vec::new(),
        }
    }

    /// `TRUE`
    pub fn always() -> Self {
        Self::raw("TRUE")
    }

    /// `FALSE`
    pub fn never() -> Self {
        Self::raw("FALSE")
    }

    pub(crate) fn empty() -> Self {
        Self {
            segments: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub(crate) fn push_sql(&mut self, sql: &str) {
        if let Some(Segment::Sql(last)) = self.segments.last_mut() {
            last.push_str(sql);
        } else {
            self.segments.push(Segment::Sql(sql.to_string()));
        }
    }

    pub(crate) fn push_param(&mut self, literal: Literal) {
        self.segments.push(Segment::Param(self.parameters.len()));
        self.parameters.push(literal);
    }

    /// Append another predicate, shifting its slots past ours
    pub(crate) fn push_predicate(&mut self, other: Predicate) {
        let shift = self.parameters.len();
        for segment in other.segments {
            match segment {
                Segment::Sql(sql) => self.push_sql(&sql),
                Segment::Param(i) => self.segments.push(Segment::Param(i + shift)),
            }
        }
        self.parameters.extend(other.parameters);
    }

    /// `(self) AND (other)`
    pub fn and(self, other: Predicate) -> Self {
        Self::join(" AND ", vec![self, other])
    }

    /// `(self) OR (other)`
    pub fn or(self, other: Predicate) -> Self {
        Self::join(" OR ", vec![self, other])
    }

    /// `NOT (self)`
    pub fn not(self) -> Self {
        let mut out = Self::empty();
        out.push_sql("NOT (");
        out.push_predicate(self);
        out.push_sql(")");
        out
    }

    /// Conjunction of every predicate; `TRUE` when there are none
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        let predicates: Vec<_> = predicates.into_iter().collect();
        match predicates.len() {
            0 => Self::always(),
            1 => predicates.into_iter().next().unwrap_or_else(Self::always),
            _ => Self::join(" AND ", predicates),
        }
    }

    /// Disjunction of every predicate; `FALSE` when there are none
    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        let predicates: Vec<_> = predicates.into_iter().collect();
        match predicates.len() {
            0 => Self::never(),
            1 => predicates.into_iter().next().unwrap_or_else(Self::never),
            _ => Self::join(" OR ", predicates),
        }
    }

    fn join(separator: &str, predicates: Vec<Predicate>) -> Self {
        let mut out = Self::empty();
        for (i, predicate) in predicates.into_iter().enumerate() {
            if i > 0 {
                out.push_sql(separator);
            }
            out.push_sql("(");
            out.push_predicate(predicate);
            out.push_sql(")");
        }
        out
    }

    /// Render with placeholders `$1..$n`
    pub fn fragment(&self) -> String {
        self.render(1)
    }

    /// Render with placeholders starting at `$first`
    pub fn render(&self, first: usize) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Sql(sql) => out.push_str(sql),
                Segment::Param(i) => {
                    out.push('$');
                    out.push_str(&(first + i).to_string());
                }
            }
        }
        out
    }

    pub fn parameters(&self) -> &[Literal] {
        &self.parameters
    }

    pub fn into_parameters(self) -> Vec<Literal> {
        self.parameters
    }

    pub fn param_count(&self) -> usize {
        self.parameters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(column: &str, value: Literal) -> Predicate {
        let mut p = Predicate::empty();
        p.push_sql(&format!("\"{}\" = ", column));
        p.push_param(value);
        p
    }

    #[test]
    fn test_single_parameter() {
        let p = eq("state_name", Literal::text("Ohio"));
        assert_eq!(p.fragment(), "\"state_name\" = $1");
        assert_eq!(p.parameters(), &[Literal::text("Ohio")]);
    }

    #[test]
    fn test_and_renumbers() {
        let p = eq("a", Literal::Integer(1)).and(eq("b", Literal::Integer(2)));
        assert_eq!(p.fragment(), "(\"a\" = $1) AND (\"b\" = $2)");
        assert_eq!(p.param_count(), 2);
        assert_eq!(p.render(4), "(\"a\" = $4) AND (\"b\" = $5)");
    }

    #[test]
    fn test_nested_composition() {
        let left = eq("a", Literal::Integer(1)).or(eq("b", Literal::Integer(2)));
        let p = Predicate::all(vec![left, eq("c", Literal::Integer(3)).not()]);
        assert_eq!(
            p.fragment(),
            "((\"a\" = $1) OR (\"b\" = $2)) AND (NOT (\"c\" = $3))"
        );
        assert_eq!(
            p.parameters(),
            &[Literal::Integer(1), Literal::Integer(2), Literal::Integer(3)]
        );
    }

    #[test]
    fn test_empty_combinators() {
        assert_eq!(Predicate::all(Vec::new()).fragment(), "TRUE");
        assert_eq!(Predicate::any(Vec::new()).fragment(), "FALSE");

        let single = Predicate::all(vec![eq("a", Literal::Integer(1))]);
        assert_eq!(single.fragment(), "\"a\" = $1");
    }
}
