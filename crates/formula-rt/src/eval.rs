//! Evaluation of bound expressions.
//!
//! Evaluation never aborts early. Each argument becomes a value (an error
//! value included) and the callee decides what to do with it, so sibling
//! arguments are always evaluated.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use formula_common::error::ErrorKind;
use formula_typeck::bound::{BoundExpr, BoundKind};
use formula_typeck::ty::{FormulaType, RecordType, TableType};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::cancel::CancellationSignal;
use crate::function::FunctionRegistry;
use crate::store::MutableStore;
use crate::value::{ErrorValue, ExpressionError, FormulaValue, RecordValue, TableValue};

/// What a name evaluates to.
#[derive(Clone, Debug)]
pub enum Binding {
    Value(FormulaValue),
    /// A store table, read with [`MutableStore::snapshot`] on each use.
    DataSource(String),
}

/// Runtime values for the names a formula refers to.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    entries: FxHashMap<String, Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_value(&mut self, name: impl Into<String>, value: FormulaValue) {
        self.entries.insert(name.into(), Binding::Value(value));
    }

    pub fn bind_data_source(&mut self, name: impl Into<String>, table: impl Into<String>) {
        self.entries.insert(name.into(), Binding::DataSource(table.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.entries.get(name)
    }
}

type EvalFuture<'a> = Pin<Box<dyn Future<Output = FormulaValue> + Send + 'a>>;

/// Walks a bound tree.
pub struct Evaluator<'a> {
    registry: &'a FunctionRegistry,
    store: &'a dyn MutableStore,
    bindings: &'a Bindings,
    cancel: &'a CancellationSignal,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        registry: &'a FunctionRegistry,
        store: &'a dyn MutableStore,
        bindings: &'a Bindings,
        cancel: &'a CancellationSignal,
    ) -> Self {
        Evaluator {
            registry,
            store,
            bindings,
            cancel,
        }
    }

    pub fn eval<'e>(&'e self, expr: &'e BoundExpr) -> EvalFuture<'e> {
        Box::pin(async move {
            match &expr.kind {
                BoundKind::Number(n) => FormulaValue::Number(*n),
                BoundKind::Text(s) => FormulaValue::Text(s.clone()),
                BoundKind::Boolean(b) => FormulaValue::Boolean(*b),
                BoundKind::Variable(name) => self.eval_variable(name, expr).await,
                BoundKind::Record(fields) => self.eval_record(fields, &expr.ty).await,
                BoundKind::Table(items) => self.eval_table(items, &expr.ty).await,
                BoundKind::Field { base, field } => {
                    let base = self.eval(base).await;
                    eval_field(base, field, expr)
                }
                BoundKind::Call { function, args } => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval(arg).await);
                    }
                    match self.registry.get(*function) {
                        Some(f) => f.invoke(values, self.cancel).await,
                        None => FormulaValue::error(
                            ExpressionError::new(
                                ErrorKind::NotSupported,
                                format!("function {} is not registered", function),
                            )
                            .with_span(expr.span),
                        ),
                    }
                }
            }
        })
    }

    async fn eval_variable(&self, name: &str, expr: &BoundExpr) -> FormulaValue {
        match self.bindings.get(name) {
            Some(Binding::Value(value)) => value.clone(),
            Some(Binding::DataSource(table)) => match self.store.snapshot(table).await {
                Ok(table) => FormulaValue::Table(table),
                Err(err) => {
                    debug!(name, %err, "data source unavailable");
                    FormulaValue::error(ExpressionError::from(err).with_span(expr.span))
                }
            },
            None => FormulaValue::error(
                ExpressionError::new(ErrorKind::NotFound, format!("`{}` has no value", name))
                    .with_span(expr.span),
            ),
        }
    }

    async fn eval_record(&self, fields: &[(String, BoundExpr)], ty: &FormulaType) -> FormulaValue {
        let mut values = BTreeMap::new();
        let mut error: Option<ErrorValue> = None;
        for (name, field) in fields {
            let value = self.eval(field).await;
            if let FormulaValue::Error(err) = value {
                error.get_or_insert(err);
                continue;
            }
            values.insert(name.clone(), value);
        }
        if let Some(err) = error {
            return FormulaValue::Error(err);
        }
        let ty = match ty.as_record() {
            Some(ty) => ty.clone(),
            None => RecordType::anonymous(values.iter().map(|(k, v)| (k.clone(), v.ty()))),
        };
        FormulaValue::Record(RecordValue::new(ty, values))
    }

    async fn eval_table(&self, items: &[BoundExpr], ty: &FormulaType) -> FormulaValue {
        let mut rows = Vec::with_capacity(items.len());
        let mut error: Option<ErrorValue> = None;
        for item in items {
            match self.eval(item).await {
                FormulaValue::Record(row) => rows.push(row),
                FormulaValue::Error(err) => {
                    error.get_or_insert(err);
                }
                FormulaValue::Blank => {}
                other => {
                    error.get_or_insert(ErrorValue::new(
                        ExpressionError::invalid_argument(format!(
                            "table item must be a record, found {}",
                            other.ty()
                        ))
                        .with_span(item.span),
                    ));
                }
            }
        }
        if let Some(err) = error {
            return FormulaValue::Error(err);
        }
        let ty = match ty.as_table() {
            Some(ty) => ty.clone(),
            None => TableType::new(RecordType::anonymous(Vec::<(String, FormulaType)>::new())),
        };
        FormulaValue::Table(TableValue::new(ty, rows))
    }
}

fn eval_field(base: FormulaValue, field: &str, expr: &BoundExpr) -> FormulaValue {
    match base {
        FormulaValue::Error(_) | FormulaValue::Blank => base,
        FormulaValue::Record(rec) => rec.get(field),
        other => FormulaValue::error(
            ExpressionError::invalid_argument(format!(
                "cannot read field `{}` of {}",
                field,
                other.ty()
            ))
            .with_span(expr.span),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use formula_common::span::Span;
    use formula_typeck::builtins::BuiltinFunction;

    fn lit(kind: BoundKind, ty: FormulaType) -> BoundExpr {
        BoundExpr::new(kind, ty, Span::new(0, 1))
    }

    fn var(name: &str) -> BoundExpr {
        lit(BoundKind::Variable(name.to_string()), FormulaType::Unknown)
    }

    #[tokio::test]
    async fn record_literal_with_error_field_is_the_error() {
        let store = InMemoryStore::new();
        let registry = FunctionRegistry::new();
        let bindings = Bindings::new();
        let cancel = CancellationSignal::new();
        let eval = Evaluator::new(&registry, &store, &bindings, &cancel);

        let expr = lit(
            BoundKind::Record(vec![
                ("a".into(), lit(BoundKind::Number(1.0), FormulaType::Number)),
                ("b".into(), var("Missing")),
            ]),
            FormulaType::Unknown,
        );
        let FormulaValue::Error(err) = eval.eval(&expr).await else {
            panic!("expected an error value");
        };
        assert_eq!(err.first().map(|e| e.kind), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn unregistered_function_is_not_supported() {
        let store = InMemoryStore::new();
        let registry = FunctionRegistry::new();
        let bindings = Bindings::new();
        let cancel = CancellationSignal::new();
        let eval = Evaluator::new(&registry, &store, &bindings, &cancel);

        let expr = lit(
            BoundKind::Call {
                function: BuiltinFunction::Blank,
                args: vec![],
            },
            FormulaType::Blank,
        );
        let value = eval.eval(&expr).await;
        insta::assert_snapshot!(value.to_string(), @"Error(NotSupported (severe): function Blank is not registered)");
    }

    #[tokio::test]
    async fn field_access_reads_bound_records() {
        let store = InMemoryStore::new();
        let registry = FunctionRegistry::new();
        let mut bindings = Bindings::new();
        bindings.bind_value(
            "r",
            FormulaValue::Record(RecordValue::anonymous([("x", FormulaValue::Number(7.0))])),
        );
        let cancel = CancellationSignal::new();
        let eval = Evaluator::new(&registry, &store, &bindings, &cancel);

        let expr = lit(
            BoundKind::Field {
                base: Box::new(var("r")),
                field: "x".into(),
            },
            FormulaType::Number,
        );
        assert_eq!(eval.eval(&expr).await, FormulaValue::Number(7.0));

        let missing = lit(
            BoundKind::Field {
                base: Box::new(var("r")),
                field: "y".into(),
            },
            FormulaType::Unknown,
        );
        assert_eq!(eval.eval(&missing).await, FormulaValue::Blank);
    }
}
