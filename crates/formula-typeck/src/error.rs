//! Type error types with provenance tracking.
//!
//! Every error carries the span of the offending expression so diagnostics
//! can point at the exact argument or record field that failed. Argument
//! type mismatches additionally record a [`ConstraintOrigin`].

use std::fmt;

use formula_common::span::Span;

use crate::builtins::BuiltinFunction;
use crate::ty::FormulaType;

/// Where a type expectation came from.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintOrigin {
    /// From a function argument: `Index(t, x)` where `x` must be a Number.
    /// `call_site` is the span of the argument itself.
    FnArg { call_site: Span, param_idx: usize },
    /// From a table literal: every item must match the first one.
    TableItem { item_span: Span },
    /// Synthetic origin with no useful location.
    Builtin,
}

/// A type error encountered during checking.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeError {
    /// The formula did not lex or parse.
    Syntax {
        message: String,
        span: Span,
        related: Option<(String, Span)>,
    },
    /// A name that no symbol table declares.
    UnboundVariable { name: String, span: Span },
    /// A call to a function the engine does not know.
    UnknownFunction { name: String, span: Span },
    /// Function called with the wrong number of arguments.
    ArityMismatch {
        function: BuiltinFunction,
        min: usize,
        max: Option<usize>,
        found: usize,
        span: Span,
    },
    /// A value of the wrong type.
    Mismatch {
        expected: FormulaType,
        found: FormulaType,
        origin: ConstraintOrigin,
    },
    /// A mutation function targets a variable that is not mutable.
    ReadOnlyTarget {
        function: BuiltinFunction,
        name: String,
        span: Span,
    },
    /// A mutation function targets something other than a table variable.
    InvalidMutationTarget { function: BuiltinFunction, span: Span },
    /// A mutation function is used while mutation functions are disabled.
    MutationFunctionsDisabled { function: BuiltinFunction, span: Span },
    /// A record field the target type does not have and cannot gain.
    UnknownField {
        type_name: String,
        field_name: String,
        span: Span,
    },
    /// A record field whose type does not fit the target's field type.
    FieldTypeMismatch {
        field_name: String,
        expected: FormulaType,
        found: FormulaType,
        span: Span,
    },
    /// Field access on a type with no such field.
    NoSuchField {
        ty: FormulaType,
        field_name: String,
        span: Span,
    },
    /// A function argument that must be a table.
    ExpectedTable {
        function: BuiltinFunction,
        found: FormulaType,
        span: Span,
    },
    /// A function argument that must be a record.
    ExpectedRecord {
        function: BuiltinFunction,
        found: FormulaType,
        span: Span,
    },
}

impl TypeError {
    /// The primary location of the error, if it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            TypeError::Syntax { span, .. }
            | TypeError::UnboundVariable { span, .. }
            | TypeError::UnknownFunction { span, .. }
            | TypeError::ArityMismatch { span, .. }
            | TypeError::ReadOnlyTarget { span, .. }
            | TypeError::InvalidMutationTarget { span, .. }
            | TypeError::MutationFunctionsDisabled { span, .. }
            | TypeError::UnknownField { span, .. }
            | TypeError::FieldTypeMismatch { span, .. }
            | TypeError::NoSuchField { span, .. }
            | TypeError::ExpectedTable { span, .. }
            | TypeError::ExpectedRecord { span, .. } => Some(*span),
            TypeError::Mismatch { origin, .. } => match origin {
                ConstraintOrigin::FnArg { call_site, .. } => Some(*call_site),
                ConstraintOrigin::TableItem { item_span } => Some(*item_span),
                ConstraintOrigin::Builtin => None,
            },
        }
    }
}

fn describe_arity(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) if max == min => format!("{}", min),
        Some(max) => format!("{} to {}", min, max),
        None => format!("at least {}", min),
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Syntax { message, .. } => write!(f, "{}", message),
            TypeError::UnboundVariable { name, .. } => {
                write!(f, "unknown name `{}`", name)
            }
            TypeError::UnknownFunction { name, .. } => {
                write!(f, "unknown function `{}`", name)
            }
            TypeError::ArityMismatch {
                function,
                min,
                max,
                found,
                ..
            } => {
                write!(
                    f,
                    "`{}` expects {} argument(s), found {}",
                    function,
                    describe_arity(*min, *max),
                    found
                )
            }
            TypeError::Mismatch {
                expected, found, ..
            } => {
                write!(f, "type mismatch: expected `{}`, found `{}`", expected, found)
            }
            TypeError::ReadOnlyTarget { function, name, .. } => {
                write!(
                    f,
                    "`{}` cannot modify `{}`: the variable is read-only",
                    function, name
                )
            }
            TypeError::InvalidMutationTarget { function, .. } => {
                write!(
                    f,
                    "the first argument of `{}` must be a table variable",
                    function
                )
            }
            TypeError::MutationFunctionsDisabled { function, .. } => {
                write!(
                    f,
                    "`{}` modifies data and mutation functions are not enabled",
                    function
                )
            }
            TypeError::UnknownField {
                type_name,
                field_name,
                ..
            } => {
                write!(f, "`{}` has no field `{}`", type_name, field_name)
            }
            TypeError::FieldTypeMismatch {
                field_name,
                expected,
                found,
                ..
            } => {
                write!(
                    f,
                    "field `{}` expects `{}`, found `{}`",
                    field_name, expected, found
                )
            }
            TypeError::NoSuchField { ty, field_name, .. } => {
                write!(f, "type `{}` has no field `{}`", ty, field_name)
            }
            TypeError::ExpectedTable {
                function, found, ..
            } => {
                write!(f, "`{}` expects a table, found `{}`", function, found)
            }
            TypeError::ExpectedRecord {
                function, found, ..
            } => {
                write!(f, "`{}` expects a record, found `{}`", function, found)
            }
        }
    }
}

impl std::error::Error for TypeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_messages() {
        let err = |min, max| TypeError::ArityMismatch {
            function: BuiltinFunction::Index,
            min,
            max,
            found: 1,
            span: Span::new(0, 5),
        };
        assert_eq!(
            err(2, Some(2)).to_string(),
            "`Index` expects 2 argument(s), found 1"
        );
        assert_eq!(
            err(3, None).to_string(),
            "`Index` expects at least 3 argument(s), found 1"
        );
        assert_eq!(
            err(0, Some(2)).to_string(),
            "`Index` expects 0 to 2 argument(s), found 1"
        );
    }

    #[test]
    fn mismatch_span_comes_from_origin() {
        let err = TypeError::Mismatch {
            expected: FormulaType::Number,
            found: FormulaType::Text,
            origin: ConstraintOrigin::FnArg {
                call_site: Span::new(9, 14),
                param_idx: 1,
            },
        };
        assert_eq!(err.span(), Some(Span::new(9, 14)));
        assert_eq!(
            err.to_string(),
            "type mismatch: expected `Number`, found `Text`"
        );

        let synthetic = TypeError::Mismatch {
            expected: FormulaType::Number,
            found: FormulaType::Text,
            origin: ConstraintOrigin::Builtin,
        };
        assert_eq!(synthetic.span(), None);
    }
}
