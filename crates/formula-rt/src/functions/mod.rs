//! The builtin function family.
//!
//! Mutation functions (`Patch`, `Collect`, `Remove`, `Clear`) hold the
//! injected store; the table builtins are stateless.

mod clear;
mod collect;
mod patch;
mod pure;
mod remove;

pub use clear::ClearFunction;
pub use collect::CollectFunction;
pub use patch::PatchFunction;
pub use pure::{BlankFunction, CountRowsFunction, FirstFunction, IndexFunction, LastFunction};
pub use remove::RemoveFunction;

use formula_typeck::builtins::BuiltinFunction;

use crate::value::{ExpressionError, FormulaValue, RecordValue, TableValue};

/// The store-backed table a mutation targets, and its source name.
fn store_target(
    function: BuiltinFunction,
    value: Option<&FormulaValue>,
) -> Result<(&TableValue, &str), ExpressionError> {
    match value {
        Some(FormulaValue::Table(table)) => match table.source.as_deref() {
            Some(source) => Ok((table, source)),
            None => Err(ExpressionError::invalid_argument(format!(
                "{} target is not backed by a data source",
                function
            ))),
        },
        Some(other) => Err(ExpressionError::invalid_argument(format!(
            "{} expects a table, found {}",
            function,
            other.ty()
        ))),
        None => Err(ExpressionError::invalid_argument(format!(
            "{} is missing its target argument",
            function
        ))),
    }
}

/// Record arguments. `Blank` arguments are skipped.
fn record_args(
    function: BuiltinFunction,
    args: &[FormulaValue],
) -> Result<Vec<RecordValue>, ExpressionError> {
    let mut records = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            FormulaValue::Record(rec) => records.push(rec.clone()),
            FormulaValue::Blank => {}
            other => {
                return Err(ExpressionError::invalid_argument(format!(
                    "{} expects a record, found {}",
                    function,
                    other.ty()
                )))
            }
        }
    }
    Ok(records)
}
