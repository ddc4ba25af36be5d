//! Function contracts and the bind-time function registry.
//!
//! Every builtin is an [`AsyncFunction`]. Functions that write to the store
//! implement [`MutationFunction`] instead and receive the shared invocation
//! contract through a blanket impl:
//!
//! 1. Validate: the first error-valued argument is returned unchanged and
//!    the store is never called.
//! 2. Check cancellation.
//! 3. Execute: exactly one store call, whose failure becomes an error value.

use std::sync::Arc;

use async_trait::async_trait;
use formula_typeck::builtins::BuiltinFunction;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::cancel::CancellationSignal;
use crate::functions::{
    BlankFunction, ClearFunction, CollectFunction, CountRowsFunction, FirstFunction,
    IndexFunction, LastFunction, PatchFunction, RemoveFunction,
};
use crate::store::MutableStore;
use crate::value::{ErrorValue, ExpressionError, FormulaValue};

/// A function callable from a formula.
#[async_trait]
pub trait AsyncFunction: Send + Sync {
    fn function(&self) -> BuiltinFunction;

    /// Invoke with already-evaluated arguments. Never panics; failures are
    /// returned as [`FormulaValue::Error`].
    async fn invoke(&self, args: Vec<FormulaValue>, cancel: &CancellationSignal) -> FormulaValue;
}

/// A function with side effects on a [`MutableStore`].
#[async_trait]
pub trait MutationFunction: Send + Sync {
    fn function(&self) -> BuiltinFunction;

    /// Perform the mutation. Called only with error-free arguments and only
    /// when cancellation had not been requested at entry.
    async fn execute(
        &self,
        args: Vec<FormulaValue>,
        cancel: &CancellationSignal,
    ) -> Result<FormulaValue, ExpressionError>;
}

#[async_trait]
impl<T: MutationFunction> AsyncFunction for T {
    fn function(&self) -> BuiltinFunction {
        MutationFunction::function(self)
    }

    async fn invoke(&self, args: Vec<FormulaValue>, cancel: &CancellationSignal) -> FormulaValue {
        let function = MutationFunction::function(self);
        if let Some(err) = first_error(&args) {
            debug!(%function, "propagating error argument");
            return FormulaValue::Error(err.clone());
        }
        if cancel.is_cancelled() {
            debug!(%function, "cancelled before mutation");
            return FormulaValue::error(ExpressionError::cancelled());
        }

        debug!(%function, args = args.len(), "invoking mutation function");
        match self.execute(args, cancel).await {
            Ok(value) => value,
            Err(err) => {
                debug!(%function, kind = %err.kind, "mutation failed");
                FormulaValue::Error(ErrorValue::new(err))
            }
        }
    }
}

/// The first error-valued argument, if any.
pub fn first_error(args: &[FormulaValue]) -> Option<&ErrorValue> {
    args.iter().find_map(|arg| match arg {
        FormulaValue::Error(err) => Some(err),
        _ => None,
    })
}

/// Maps builtin ids to implementations.
///
/// Filled once when the engine is built; calls are dispatched by the id the
/// checker bound, never by name.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<BuiltinFunction, Arc<dyn AsyncFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every builtin, mutation functions writing to `store`.
    pub fn with_store(store: Arc<dyn MutableStore>) -> Self {
        let mut registry = FunctionRegistry::new();
        registry.register(Arc::new(PatchFunction::new(store.clone())));
        registry.register(Arc::new(CollectFunction::new(store.clone())));
        registry.register(Arc::new(RemoveFunction::new(store.clone())));
        registry.register(Arc::new(ClearFunction::new(store)));
        registry.register(Arc::new(IndexFunction));
        registry.register(Arc::new(FirstFunction));
        registry.register(Arc::new(LastFunction));
        registry.register(Arc::new(CountRowsFunction));
        registry.register(Arc::new(BlankFunction));
        registry
    }

    /// Add or replace the implementation for `function.function()`.
    pub fn register(&mut self, function: Arc<dyn AsyncFunction>) {
        self.functions.insert(function.function(), function);
    }

    pub fn get(&self, function: BuiltinFunction) -> Option<Arc<dyn AsyncFunction>> {
        self.functions.get(&function).cloned()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
