//! Expression tree produced by the parser.
//!
//! The tree is deliberately small: literals, names, calls, record and table
//! literals, and field access. Every node carries the span it was parsed
//! from so the checker can point diagnostics at the offending argument.

use formula_common::span::Span;

/// An identifier together with where it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    /// The identifier text with any `'...'` quoting removed.
    pub text: String,
    pub span: Span,
}

impl Name {
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        Name {
            text: text.into(),
            span,
        }
    }
}

/// One `name: value` entry of a record literal.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: Name,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// A variable reference.
    Ident(Name),
    /// `Func(arg, ...)`.
    Call { func: Name, args: Vec<Expr> },
    /// `{a: 1, b: "x"}`.
    Record(Vec<RecordField>),
    /// `[1, 2]` or `[{a: 1}, {a: 2}]`.
    Table(Vec<Expr>),
    /// `base.field`.
    Field { base: Box<Expr>, field: Name },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    /// The variable name if this expression is a bare identifier.
    pub fn as_ident(&self) -> Option<&Name> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// The callee and arguments if this expression is a call.
    pub fn as_call(&self) -> Option<(&Name, &[Expr])> {
        match &self.kind {
            ExprKind::Call { func, args } => Some((func, args)),
            _ => None,
        }
    }
}
