//! # Filter Language
//!
//! Text filter → tokens → [`FilterAst`] → parameterized [`Predicate`].
//!
//! Parsing never consults a catalog; compilation binds every column
//! reference against one and fails before any statement reaches storage.
//! Literal values are never spliced into SQL text.

mod ast;
mod compiler;
mod errors;
mod lexer;
mod literal;
mod parser;
mod predicate;

pub use ast::{ComparisonOp, FilterAst, LogicalOp, SpatialRelationship};
pub use compiler::{column_equals, compile, compile_text, FilterCompiler, DEFAULT_SRID};
pub use errors::{FilterError, FilterResult};
pub use lexer::{tokenize, Spanned, Token};
pub use literal::Literal;
pub use parser::{parse, MAX_DEPTH};
pub use predicate::Predicate;
