use std::sync::Arc;

use async_trait::async_trait;
use formula_typeck::builtins::BuiltinFunction;

use super::{record_args, store_target};
use crate::cancel::CancellationSignal;
use crate::function::MutationFunction;
use crate::store::MutableStore;
use crate::value::{ExpressionError, FormulaValue};

/// `Patch(table, selector, change, ...)` updates the row matching
/// `selector` in the store. `Patch(record, change, ...)` merges records
/// without touching the store.
pub struct PatchFunction {
    store: Arc<dyn MutableStore>,
}

impl PatchFunction {
    pub fn new(store: Arc<dyn MutableStore>) -> Self {
        PatchFunction { store }
    }
}

#[async_trait]
impl MutationFunction for PatchFunction {
    fn function(&self) -> BuiltinFunction {
        BuiltinFunction::Patch
    }

    async fn execute(
        &self,
        args: Vec<FormulaValue>,
        cancel: &CancellationSignal,
    ) -> Result<FormulaValue, ExpressionError> {
        let function = BuiltinFunction::Patch;

        if let Some(FormulaValue::Record(base)) = args.first() {
            let mut merged = base.clone();
            for change in record_args(function, &args[1..])? {
                merged.merge(&change);
            }
            return Ok(FormulaValue::Record(merged));
        }

        let (_, source) = store_target(function, args.first())?;
        if args.len() < 3 {
            return Err(ExpressionError::invalid_argument(
                "Patch on a table needs a selector and at least one change record",
            ));
        }
        let selector = match &args[1] {
            FormulaValue::Record(rec) => rec,
            other => {
                return Err(ExpressionError::invalid_argument(format!(
                    "Patch expects a record selector, found {}",
                    other.ty()
                )))
            }
        };
        let changes = record_args(function, &args[2..])?;

        let updated = self
            .store
            .update_by_selector(source, selector, &changes, cancel)
            .await?;
        Ok(FormulaValue::Record(updated))
    }
}
