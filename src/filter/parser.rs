//! Filter parser
//!
//! Recursive descent over the token stream:
//!
//! ```text
//! or_expr   := and_expr ( OR and_expr )*
//! and_expr  := unary ( AND unary )*
//! unary     := NOT unary | primary
//! primary   := '(' or_expr ')' | REL '(' column ',' wkt ')' | predicate
//! predicate := column ( cmp literal | [NOT] LIKE str | [NOT] ILIKE str
//!                     | [NOT] BETWEEN lit AND lit | [NOT] IN '(' lit, ... ')'
//!                     | IS [NOT] NULL )
//! ```
//!
//! No column validation happens here. Nesting through parentheses, `NOT`
//! and geometry bodies is capped at [`MAX_DEPTH`].

use super::ast::{ComparisonOp, FilterAst, LogicalOp, SpatialRelationship};
use super::errors::{FilterError, FilterResult};
use super::lexer::{tokenize, Spanned, Token};
use super::literal::Literal;

/// Words that can never be bare column names
const RESERVED: &[&str] = &[
    "AND", "OR", "NOT", "LIKE", "ILIKE", "BETWEEN", "IN", "IS", "NULL", "TRUE", "FALSE",
];

const WKT_TYPES: &[&str] = &[
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
];

/// Deepest nesting of groups, negations and geometry bodies accepted
pub const MAX_DEPTH: usize = 128;

/// Parse filter text into an AST
pub fn parse(input: &str) -> FilterResult<FilterAst> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FilterError::syntax(0, "empty filter"));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };

    let ast = parser.or_expr()?;

    if let Some(trailing) = parser.peek() {
        return Err(FilterError::syntax(
            trailing.offset,
            format!("unexpected {}", trailing.token.describe()),
        ));
    }

    Ok(ast)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn peek_nth_token(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Offset of the next token, or end of input
    fn offset(&self) -> usize {
        self.peek().map(|s| s.offset).unwrap_or(self.end)
    }

    fn error(&self, expected: &str) -> FilterError {
        match self.peek() {
            Some(s) => FilterError::syntax(
                s.offset,
                format!("expected {}, found {}", expected, s.token.describe()),
            ),
            None => FilterError::syntax(self.end, format!("expected {}, found end of input", expected)),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek_token(), Some(Token::Ident(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> FilterResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(keyword))
        }
    }

    fn expect(&mut self, token: Token) -> FilterResult<()> {
        if self.peek_token() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&token.describe()))
        }
    }

    /// Enter one nesting level; errors past `MAX_DEPTH`
    fn descend(&mut self) -> FilterResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(FilterError::syntax(self.offset(), "filter nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn or_expr(&mut self) -> FilterResult<FilterAst> {
        let mut children = vec![self.and_expr()?];
        while self.eat_keyword("OR") {
            children.push(self.and_expr()?);
        }
        Ok(collapse(LogicalOp::Or, children))
    }

    fn and_expr(&mut self) -> FilterResult<FilterAst> {
        let mut children = vec![self.unary()?];
        while self.eat_keyword("AND") {
            children.push(self.unary()?);
        }
        Ok(collapse(LogicalOp::And, children))
    }

    fn unary(&mut self) -> FilterResult<FilterAst> {
        if self.eat_keyword("NOT") {
            self.descend()?;
            let inner = self.unary()?;
            self.ascend();
            return Ok(FilterAst::not(inner));
        }
        self.primary()
    }

    fn primary(&mut self) -> FilterResult<FilterAst> {
        if self.peek_token() == Some(&Token::LParen) {
            self.pos += 1;
            self.descend()?;
            let inner = self.or_expr()?;
            self.ascend();
            self.expect(Token::RParen)?;
            return Ok(inner);
        }

        if let Some(Token::Ident(word)) = self.peek_token() {
            if let Some(relationship) = SpatialRelationship::from_keyword(word) {
                if self.peek_nth_token(1) == Some(&Token::LParen) {
                    self.pos += 1;
                    return self.spatial(relationship);
                }
            }
        }

        self.predicate()
    }

    fn column(&mut self) -> FilterResult<String> {
        match self.peek_token() {
            Some(Token::QuotedIdent(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            Some(Token::Ident(name))
                if !RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name)) =>
            {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error("column name")),
        }
    }

    fn predicate(&mut self) -> FilterResult<FilterAst> {
        let column = self.column()?;

        let op = match self.peek_token() {
            Some(Token::Eq) => Some(ComparisonOp::Eq),
            Some(Token::NotEq) => Some(ComparisonOp::NotEq),
            Some(Token::Lt) => Some(ComparisonOp::Lt),
            Some(Token::LtEq) => Some(ComparisonOp::LtEq),
            Some(Token::Gt) => Some(ComparisonOp::Gt),
            Some(Token::GtEq) => Some(ComparisonOp::GtEq),
            _ => None,
        };

        if let Some(op) = op {
            self.pos += 1;
            let literal = self.literal()?;
            return Ok(FilterAst::Comparison {
                column,
                op,
                literal,
            });
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            let node = FilterAst::IsNull { column };
            return Ok(if negated { FilterAst::not(node) } else { node });
        }

        let negated = self.eat_keyword("NOT");
        let node = self.keyword_predicate(column)?;
        Ok(if negated { FilterAst::not(node) } else { node })
    }

    /// LIKE / ILIKE / BETWEEN / IN
    fn keyword_predicate(&mut self, column: String) -> FilterResult<FilterAst> {
        if self.eat_keyword("LIKE") {
            let pattern = self.string()?;
            return Ok(FilterAst::comparison(column, ComparisonOp::Like, pattern));
        }

        if self.eat_keyword("ILIKE") {
            let pattern = self.string()?;
            return Ok(FilterAst::comparison(column, ComparisonOp::ILike, pattern));
        }

        if self.eat_keyword("BETWEEN") {
            let low = self.literal()?;
            self.expect_keyword("AND")?;
            let high = self.literal()?;
            return Ok(FilterAst::Between { column, low, high });
        }

        if self.eat_keyword("IN") {
            self.expect(Token::LParen)?;
            let mut values = vec![self.literal()?];
            while self.peek_token() == Some(&Token::Comma) {
                self.pos += 1;
                values.push(self.literal()?);
            }
            self.expect(Token::RParen)?;
            return Ok(FilterAst::InList { column, values });
        }

        Err(self.error("operator"))
    }

    fn string(&mut self) -> FilterResult<Literal> {
        match self.peek_token() {
            Some(Token::Str(s)) => {
                let literal = Literal::Text(s.clone());
                self.pos += 1;
                Ok(literal)
            }
            _ => Err(self.error("string literal")),
        }
    }

    fn literal(&mut self) -> FilterResult<Literal> {
        let literal = match self.peek_token() {
            Some(Token::Str(s)) => Literal::Text(s.clone()),
            Some(Token::Integer(i)) => Literal::Integer(*i),
            Some(Token::Float(f)) => Literal::Float(*f),
            Some(Token::Ident(w)) if w.eq_ignore_ascii_case("TRUE") => Literal::Boolean(true),
            Some(Token::Ident(w)) if w.eq_ignore_ascii_case("FALSE") => Literal::Boolean(false),
            _ => return Err(self.error("literal")),
        };
        self.pos += 1;
        Ok(literal)
    }

    /// `REL` has been consumed; parses `'(' column ',' wkt ')'`
    fn spatial(&mut self, relationship: SpatialRelationship) -> FilterResult<FilterAst> {
        self.expect(Token::LParen)?;
        let column = self.column()?;
        self.expect(Token::Comma)?;
        let geometry = self.wkt()?;
        self.expect(Token::RParen)?;

        Ok(FilterAst::Spatial {
            relationship,
            column,
            geometry,
        })
    }

    /// Well-known-text geometry, re-emitted in canonical spacing
    fn wkt(&mut self) -> FilterResult<String> {
        let start = self.offset();
        let kind = match self.advance() {
            Some(Spanned {
                token: Token::Ident(word),
                ..
            }) if WKT_TYPES.iter().any(|t| t.eq_ignore_ascii_case(&word)) => {
                word.to_ascii_uppercase()
            }
            _ => return Err(FilterError::syntax(start, "expected geometry literal")),
        };

        let mut out = kind.clone();

        for dim in ["ZM", "Z", "M"] {
            if self.eat_keyword(dim) {
                out.push(' ');
                out.push_str(dim);
                break;
            }
        }

        if self.eat_keyword("EMPTY") {
            out.push_str(" EMPTY");
            return Ok(out);
        }

        let body = self.wkt_body(kind == "GEOMETRYCOLLECTION")?;
        out.push_str(&body);
        Ok(out)
    }

    /// Parenthesised WKT body: nested rings, coordinates or member geometries
    fn wkt_body(&mut self, collection: bool) -> FilterResult<String> {
        self.expect(Token::LParen)?;
        self.descend()?;

        let mut items = Vec::new();
        loop {
            let item = if self.peek_token() == Some(&Token::LParen) {
                self.wkt_body(false)?
            } else if collection {
                self.wkt()?
            } else {
                self.coordinate()?
            };
            items.push(item);

            match self.peek_token() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::RParen) => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.error("',' or ')' in geometry")),
            }
        }

        self.ascend();
        Ok(format!("({})", items.join(", ")))
    }

    /// Two to four ordinates separated by whitespace
    fn coordinate(&mut self) -> FilterResult<String> {
        let mut ordinates = Vec::new();
        while let Some(token) = self.peek_token() {
            let ordinate = match token {
                Token::Integer(i) => i.to_string(),
                Token::Float(f) => f.to_string(),
                _ => break,
            };
            ordinates.push(ordinate);
            self.pos += 1;
        }

        if !(2..=4).contains(&ordinates.len()) {
            return Err(self.error("coordinate"));
        }

        Ok(ordinates.join(" "))
    }
}

/// Wrap multiple children in one logical node; a single child stands alone
fn collapse(op: LogicalOp, mut children: Vec<FilterAst>) -> FilterAst {
    if children.len() == 1 {
        return children.remove(0);
    }
    FilterAst::Logical { op, children }
}
