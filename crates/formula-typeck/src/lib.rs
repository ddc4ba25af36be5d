//! Formula type checker.
//!
//! Validates parsed formulas against symbol tables and host-supplied record
//! types whose fields may be registered lazily at runtime.
//!
//! # Architecture
//!
//! - [`ty`]: Formula types, record and table type handles
//! - [`record`]: Record descriptors, the field registry and [`record::LazyRecordType`]
//! - [`symbols`]: Symbol tables with mutability flags
//! - [`builtins`]: Builtin function identities and arities
//! - [`compat`]: Structural compatibility and per-pass descriptor snapshots
//! - [`check`]: The checking pass
//! - [`bound`]: The bound tree handed to the runtime
//! - [`error`]: Type errors with spans
//! - [`diagnostics`]: ariadne and JSON rendering

pub mod bound;
pub mod builtins;
pub mod check;
pub mod compat;
pub mod diagnostics;
pub mod error;
pub mod record;
pub mod symbols;
pub mod ty;

use std::fmt;

use formula_common::span::Span;
use formula_parser::{Expr, Parse};

use crate::bound::BoundExpr;
use crate::check::Checker;
use crate::diagnostics::{render_diagnostic, DiagnosticOptions};
use crate::error::TypeError;
use crate::symbols::{SymbolStack, SymbolTable};
use crate::ty::FormulaType;

/// The result of checking a formula.
#[derive(Debug)]
pub struct CheckResult {
    /// Syntax and type errors, in the order they were found.
    pub errors: Vec<TypeError>,
    /// The formula's type, when checking succeeded.
    pub result_type: Option<FormulaType>,
    /// The bound tree, when checking succeeded.
    pub bound: Option<BoundExpr>,
}

impl CheckResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.bound.is_some()
    }

    /// Render every error against the formula text.
    pub fn render_errors(&self, source: &str, filename: &str, options: &DiagnosticOptions) -> Vec<String> {
        self.errors
            .iter()
            .map(|err| render_diagnostic(err, source, filename, options))
            .collect()
    }
}

/// Check a parsed formula against a stack of symbol tables.
///
/// Tables are searched from the last one backwards, so per-call tables go
/// after the engine's table. Syntax errors short-circuit the check.
pub fn check(parse: &Parse, tables: &[&SymbolTable]) -> CheckResult {
    let expr = match parse.expr() {
        Some(expr) if parse.ok() => expr,
        _ => {
            let errors = parse
                .errors()
                .iter()
                .map(|e| TypeError::Syntax {
                    message: e.message.clone(),
                    span: e.span,
                    related: e.related.clone(),
                })
                .collect();
            return CheckResult {
                errors,
                result_type: None,
                bound: None,
            };
        }
    };
    check_expr(expr, tables)
}

/// Check an already-parsed expression.
pub fn check_expr(expr: &Expr, tables: &[&SymbolTable]) -> CheckResult {
    let mut checker = Checker::new(SymbolStack::new(tables));
    let bound = checker.check_expr(expr);
    let errors = checker.into_errors();
    match bound {
        Some(bound) if errors.is_empty() => CheckResult {
            errors,
            result_type: Some(bound.ty.clone()),
            bound: Some(bound),
        },
        _ => CheckResult {
            errors,
            result_type: None,
            bound: None,
        },
    }
}

/// The first problem found by [`check_call`].
#[derive(Clone, Debug, PartialEq)]
pub struct CheckFailure {
    pub message: String,
    pub span: Option<Span>,
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CheckFailure {}

/// Validate one call expression against a single symbol table.
pub fn check_call(expr: &Expr, symbols: &SymbolTable) -> Result<(), CheckFailure> {
    let result = check_expr(expr, &[symbols]);
    match result.errors.into_iter().next() {
        None => Ok(()),
        Some(err) => Err(CheckFailure {
            message: err.to_string(),
            span: err.span(),
        }),
    }
}
