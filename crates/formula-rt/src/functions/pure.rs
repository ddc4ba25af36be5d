//! Read-only table builtins.
//!
//! These implement [`AsyncFunction`] directly and follow the same error
//! contract as the mutation family: an error argument is returned as is.

use async_trait::async_trait;
use formula_typeck::builtins::BuiltinFunction;

use crate::cancel::CancellationSignal;
use crate::function::{first_error, AsyncFunction};
use crate::value::{ExpressionError, FormulaValue, TableValue};

/// The table argument, `None` for `Blank`.
fn table_arg(
    function: BuiltinFunction,
    value: Option<&FormulaValue>,
) -> Result<Option<&TableValue>, ExpressionError> {
    match value {
        Some(FormulaValue::Table(table)) => Ok(Some(table)),
        Some(FormulaValue::Blank) | None => Ok(None),
        Some(other) => Err(ExpressionError::invalid_argument(format!(
            "{} expects a table, found {}",
            function,
            other.ty()
        ))),
    }
}

fn finish(result: Result<FormulaValue, ExpressionError>) -> FormulaValue {
    result.unwrap_or_else(FormulaValue::error)
}

/// `Index(table, n)`: the `n`th row, counting from 1.
pub struct IndexFunction;

impl IndexFunction {
    fn index(args: &[FormulaValue]) -> Result<FormulaValue, ExpressionError> {
        let Some(table) = table_arg(BuiltinFunction::Index, args.first())? else {
            return Ok(FormulaValue::Blank);
        };
        let n = match args.get(1) {
            Some(FormulaValue::Number(n)) => *n,
            Some(FormulaValue::Blank) | None => 0.0,
            Some(other) => {
                return Err(ExpressionError::invalid_argument(format!(
                    "Index expects a number, found {}",
                    other.ty()
                )))
            }
        };
        let n = n.trunc();
        if !n.is_finite() || n < 1.0 || n > table.len() as f64 {
            return Err(ExpressionError::invalid_argument(format!(
                "index {} is out of range for a table of {} row(s)",
                n,
                table.len()
            )));
        }
        Ok(FormulaValue::Record(table.rows[n as usize - 1].clone()))
    }
}

#[async_trait]
impl AsyncFunction for IndexFunction {
    fn function(&self) -> BuiltinFunction {
        BuiltinFunction::Index
    }

    async fn invoke(&self, args: Vec<FormulaValue>, _cancel: &CancellationSignal) -> FormulaValue {
        if let Some(err) = first_error(&args) {
            return FormulaValue::Error(err.clone());
        }
        finish(IndexFunction::index(&args))
    }
}

/// `First(table)`: the first row, `Blank` when empty.
pub struct FirstFunction;

#[async_trait]
impl AsyncFunction for FirstFunction {
    fn function(&self) -> BuiltinFunction {
        BuiltinFunction::First
    }

    async fn invoke(&self, args: Vec<FormulaValue>, _cancel: &CancellationSignal) -> FormulaValue {
        if let Some(err) = first_error(&args) {
            return FormulaValue::Error(err.clone());
        }
        finish(table_arg(BuiltinFunction::First, args.first()).map(|table| {
            table
                .and_then(|t| t.rows.first())
                .map_or(FormulaValue::Blank, |row| FormulaValue::Record(row.clone()))
        }))
    }
}

/// `Last(table)`: the last row, `Blank` when empty.
pub struct LastFunction;

#[async_trait]
impl AsyncFunction for LastFunction {
    fn function(&self) -> BuiltinFunction {
        BuiltinFunction::Last
    }

    async fn invoke(&self, args: Vec<FormulaValue>, _cancel: &CancellationSignal) -> FormulaValue {
        if let Some(err) = first_error(&args) {
            return FormulaValue::Error(err.clone());
        }
        finish(table_arg(BuiltinFunction::Last, args.first()).map(|table| {
            table
                .and_then(|t| t.rows.last())
                .map_or(FormulaValue::Blank, |row| FormulaValue::Record(row.clone()))
        }))
    }
}

/// `CountRows(table)`.
pub struct CountRowsFunction;

#[async_trait]
impl AsyncFunction for CountRowsFunction {
    fn function(&self) -> BuiltinFunction {
        BuiltinFunction::CountRows
    }

    async fn invoke(&self, args: Vec<FormulaValue>, _cancel: &CancellationSignal) -> FormulaValue {
        if let Some(err) = first_error(&args) {
            return FormulaValue::Error(err.clone());
        }
        finish(
            table_arg(BuiltinFunction::CountRows, args.first())
                .map(|table| FormulaValue::Number(table.map_or(0, TableValue::len) as f64)),
        )
    }
}

/// `Blank()`.
pub struct BlankFunction;

#[async_trait]
impl AsyncFunction for BlankFunction {
    fn function(&self) -> BuiltinFunction {
        BuiltinFunction::Blank
    }

    async fn invoke(&self, _args: Vec<FormulaValue>, _cancel: &CancellationSignal) -> FormulaValue {
        FormulaValue::Blank
    }
}
