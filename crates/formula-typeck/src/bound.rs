//! The bound expression tree.
//!
//! Produced by a successful checking pass. Every node carries its checked
//! type, and every call is resolved to a [`BuiltinFunction`] so the runtime
//! never looks functions up by name.

use formula_common::span::Span;

use crate::builtins::BuiltinFunction;
use crate::ty::FormulaType;

#[derive(Clone, Debug)]
pub struct BoundExpr {
    pub kind: BoundKind,
    pub ty: FormulaType,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum BoundKind {
    Number(f64),
    Text(String),
    Boolean(bool),
    Variable(String),
    /// Record literal. Field order follows the source.
    Record(Vec<(String, BoundExpr)>),
    /// Table literal. Primitive items have already been wrapped into
    /// single-field `{Value: ...}` records.
    Table(Vec<BoundExpr>),
    Field {
        base: Box<BoundExpr>,
        field: String,
    },
    Call {
        function: BuiltinFunction,
        args: Vec<BoundExpr>,
    },
}

impl BoundExpr {
    pub fn new(kind: BoundKind, ty: FormulaType, span: Span) -> Self {
        BoundExpr { kind, ty, span }
    }
}
