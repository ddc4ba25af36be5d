//! Formula parser: recursive descent over the `formula-lexer` token stream.
//!
//! Only the subset of the formula language the checker and evaluator
//! understand is accepted: literals, names, calls, record and table literals,
//! and field access.

pub mod ast;
pub mod error;
mod parser;

use formula_lexer::Lexer;

pub use ast::{Expr, ExprKind, Name, RecordField};
pub use error::ParseError;

/// Result of parsing a formula.
///
/// Holds the expression tree when parsing succeeded, plus every lexer error
/// and at most one parser error (first-error-only strategy).
#[derive(Debug)]
pub struct Parse {
    expr: Option<Expr>,
    errors: Vec<ParseError>,
}

impl Parse {
    /// The parsed expression, if there were no errors.
    pub fn expr(&self) -> Option<&Expr> {
        self.expr.as_ref()
    }

    /// Lexer and parser errors, lexer errors first.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Whether parsing completed without errors.
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse a formula into an expression tree.
pub fn parse(source: &str) -> Parse {
    let (tokens, lex_errors) = Lexer::tokenize_with_errors(source);
    let mut errors: Vec<ParseError> = lex_errors.into_iter().map(ParseError::from).collect();

    let mut parser = parser::Parser::new(tokens, source);
    let result = parser.parse_formula();
    errors.extend(parser.into_errors());

    let expr = match result {
        Ok(expr) if errors.is_empty() => Some(expr),
        _ => None,
    };
    Parse { expr, errors }
}
