//! The engine: parse, check, then evaluate.

use std::sync::Arc;

use formula_parser::ParseError;
use formula_typeck::error::TypeError;
use formula_typeck::symbols::SymbolTable;
use formula_typeck::CheckResult;
use thiserror::Error;
use tracing::info;

use crate::cancel::CancellationSignal;
use crate::eval::{Bindings, Evaluator};
use crate::function::FunctionRegistry;
use crate::store::MutableStore;
use crate::value::FormulaValue;

/// Engine-level settings.
///
/// The config owns the engine's symbol table. Mutation functions are off
/// until [`EngineConfig::with_mutation_functions`] turns them on.
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    symbols: SymbolTable,
}

impl EngineConfig {
    pub fn with_mutation_functions(mut self) -> Self {
        self.symbols.enable_mutation_functions();
        self
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbol_table_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }
}

/// Why a formula was not evaluated.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("formula has {} syntax error(s)", .0.len())]
    Parse(Vec<ParseError>),

    #[error("formula has {} type error(s)", .0.len())]
    Check(Vec<TypeError>),
}

pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn MutableStore>,
    registry: FunctionRegistry,
}

impl Engine {
    /// An engine whose mutation functions write to `store`.
    pub fn new(config: EngineConfig, store: Arc<dyn MutableStore>) -> Self {
        let registry = FunctionRegistry::with_store(store.clone());
        Engine {
            config,
            store,
            registry,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    /// Check `source` against the engine table and an optional per-call
    /// table. Names in the per-call table shadow the engine's.
    pub fn check(&self, source: &str, symbols: Option<&SymbolTable>) -> CheckResult {
        let parse = formula_parser::parse(source);
        let mut tables = vec![&self.config.symbols];
        tables.extend(symbols);
        let result = formula_typeck::check(&parse, &tables);
        info!(
            errors = result.errors.len(),
            ty = ?result.result_type.as_ref().map(ToString::to_string),
            "checked formula"
        );
        result
    }

    /// Check and evaluate `source`. Formulas that fail to parse or check are
    /// never evaluated.
    pub async fn eval(
        &self,
        source: &str,
        symbols: Option<&SymbolTable>,
        bindings: &Bindings,
        cancel: &CancellationSignal,
    ) -> Result<FormulaValue, EngineError> {
        let parse = formula_parser::parse(source);
        if !parse.ok() {
            return Err(EngineError::Parse(parse.errors().to_vec()));
        }
        let mut tables = vec![&self.config.symbols];
        tables.extend(symbols);
        let result = formula_typeck::check(&parse, &tables);
        let bound = match result.bound {
            Some(bound) if result.errors.is_empty() => bound,
            _ => return Err(EngineError::Check(result.errors)),
        };

        let evaluator = Evaluator::new(&self.registry, self.store.as_ref(), bindings, cancel);
        let value = evaluator.eval(&bound).await;
        info!(is_error = value.is_error(), ty = %bound.ty, "evaluated formula");
        Ok(value)
    }
}
