use std::sync::Arc;

use async_trait::async_trait;
use formula_typeck::builtins::BuiltinFunction;

use super::store_target;
use crate::cancel::CancellationSignal;
use crate::function::MutationFunction;
use crate::store::MutableStore;
use crate::value::{ExpressionError, FormulaValue};

/// `Clear(table)` removes every row.
pub struct ClearFunction {
    store: Arc<dyn MutableStore>,
}

impl ClearFunction {
    pub fn new(store: Arc<dyn MutableStore>) -> Self {
        ClearFunction { store }
    }
}

#[async_trait]
impl MutationFunction for ClearFunction {
    fn function(&self) -> BuiltinFunction {
        BuiltinFunction::Clear
    }

    async fn execute(
        &self,
        args: Vec<FormulaValue>,
        cancel: &CancellationSignal,
    ) -> Result<FormulaValue, ExpressionError> {
        let (_, source) = store_target(BuiltinFunction::Clear, args.first())?;
        self.store.clear(source, cancel).await?;
        Ok(FormulaValue::Void)
    }
}
