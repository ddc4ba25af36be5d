use std::sync::Arc;

use async_trait::async_trait;
use formula_typeck::builtins::BuiltinFunction;

use super::{record_args, store_target};
use crate::cancel::CancellationSignal;
use crate::function::MutationFunction;
use crate::store::MutableStore;
use crate::value::{ExpressionError, FormulaValue};

/// `Remove(table, record, ...)` removes the first row matching each record.
pub struct RemoveFunction {
    store: Arc<dyn MutableStore>,
}

impl RemoveFunction {
    pub fn new(store: Arc<dyn MutableStore>) -> Self {
        RemoveFunction { store }
    }
}

#[async_trait]
impl MutationFunction for RemoveFunction {
    fn function(&self) -> BuiltinFunction {
        BuiltinFunction::Remove
    }

    async fn execute(
        &self,
        args: Vec<FormulaValue>,
        cancel: &CancellationSignal,
    ) -> Result<FormulaValue, ExpressionError> {
        let function = BuiltinFunction::Remove;
        let (_, source) = store_target(function, args.first())?;
        let rows = record_args(function, args.get(1..).unwrap_or_default())?;

        self.store.remove(source, &rows, cancel).await?;
        Ok(FormulaValue::Void)
    }
}
