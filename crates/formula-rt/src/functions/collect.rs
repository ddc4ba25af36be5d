use std::sync::Arc;

use async_trait::async_trait;
use formula_typeck::builtins::BuiltinFunction;

use super::{record_args, store_target};
use crate::cancel::CancellationSignal;
use crate::function::MutationFunction;
use crate::store::MutableStore;
use crate::value::{ExpressionError, FormulaValue};

/// `Collect(table, record, ...)` appends rows. Returns the appended row
/// when given one record, otherwise the whole table.
pub struct CollectFunction {
    store: Arc<dyn MutableStore>,
}

impl CollectFunction {
    pub fn new(store: Arc<dyn MutableStore>) -> Self {
        CollectFunction { store }
    }
}

#[async_trait]
impl MutationFunction for CollectFunction {
    fn function(&self) -> BuiltinFunction {
        BuiltinFunction::Collect
    }

    async fn execute(
        &self,
        args: Vec<FormulaValue>,
        cancel: &CancellationSignal,
    ) -> Result<FormulaValue, ExpressionError> {
        let function = BuiltinFunction::Collect;
        let (_, source) = store_target(function, args.first())?;
        let rows = record_args(function, args.get(1..).unwrap_or_default())?;

        let table = self.store.append(source, &rows, cancel).await?;
        if rows.len() == 1 {
            if let Some(last) = table.rows.last() {
                return Ok(FormulaValue::Record(last.clone()));
            }
        }
        Ok(FormulaValue::Table(table))
    }
}
