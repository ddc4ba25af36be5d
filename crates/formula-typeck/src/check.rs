//! The checking pass.
//!
//! Walks a parsed [`Expr`], resolves names through the symbol stack, resolves
//! calls to [`BuiltinFunction`]s and validates their arguments. Mutation
//! calls get the full target / selector / change validation, including lazy
//! registration of new fields into open record descriptors.
//!
//! Errors are collected rather than returned early so one pass reports every
//! independent problem. A failed sub-expression yields `None` and the
//! enclosing call stops validating that argument.

use formula_common::span::Span;
use formula_parser::{Expr, ExprKind, RecordField};

use crate::bound::{BoundExpr, BoundKind};
use crate::builtins::BuiltinFunction;
use crate::compat::{check_compatible, FieldSource, Incompatibility, Snapshots};
use crate::error::{ConstraintOrigin, TypeError};
use crate::symbols::SymbolStack;
use crate::ty::{FormulaType, RecordType, TableType};

/// Name of the field primitive table items are wrapped into.
pub const VALUE_FIELD: &str = "Value";

pub(crate) struct Checker<'a> {
    symbols: SymbolStack<'a>,
    snapshots: Snapshots,
    errors: Vec<TypeError>,
}

impl<'a> Checker<'a> {
    pub(crate) fn new(symbols: SymbolStack<'a>) -> Self {
        Checker {
            symbols,
            snapshots: Snapshots::new(),
            errors: Vec::new(),
        }
    }

    /// Finish the pass. Fields registered during the pass are written to
    /// their descriptors only if the pass found no errors.
    pub(crate) fn into_errors(self) -> Vec<TypeError> {
        if self.errors.is_empty() {
            self.snapshots.commit();
        }
        self.errors
    }

    fn error(&mut self, err: TypeError) {
        self.errors.push(err);
    }

    // ── Expressions ──────────────────────────────────────────────────────

    pub(crate) fn check_expr(&mut self, expr: &Expr) -> Option<BoundExpr> {
        match &expr.kind {
            ExprKind::Number(n) => Some(BoundExpr::new(
                BoundKind::Number(*n),
                FormulaType::Number,
                expr.span,
            )),
            ExprKind::Text(s) => Some(BoundExpr::new(
                BoundKind::Text(s.clone()),
                FormulaType::Text,
                expr.span,
            )),
            ExprKind::Boolean(b) => Some(BoundExpr::new(
                BoundKind::Boolean(*b),
                FormulaType::Boolean,
                expr.span,
            )),
            ExprKind::Ident(name) => match self.symbols.lookup(&name.text) {
                Some(entry) => Some(BoundExpr::new(
                    BoundKind::Variable(entry.name.clone()),
                    entry.ty.clone(),
                    expr.span,
                )),
                None => {
                    self.error(TypeError::UnboundVariable {
                        name: name.text.clone(),
                        span: name.span,
                    });
                    None
                }
            },
            ExprKind::Record(fields) => self.check_record_literal(fields, expr.span),
            ExprKind::Table(items) => self.check_table_literal(items, expr.span),
            ExprKind::Field { base, field } => {
                let base = self.check_expr(base)?;
                let ty = match &base.ty {
                    FormulaType::Record(rt) => match self.snapshots.field_type(rt, &field.text) {
                        Some(ty) => ty,
                        None if rt.is_extensible() => FormulaType::Unknown,
                        None => {
                            self.error(TypeError::NoSuchField {
                                ty: base.ty.clone(),
                                field_name: field.text.clone(),
                                span: field.span,
                            });
                            return None;
                        }
                    },
                    FormulaType::Blank | FormulaType::Unknown => FormulaType::Unknown,
                    other => {
                        self.error(TypeError::NoSuchField {
                            ty: other.clone(),
                            field_name: field.text.clone(),
                            span: field.span,
                        });
                        return None;
                    }
                };
                Some(BoundExpr::new(
                    BoundKind::Field {
                        base: Box::new(base),
                        field: field.text.clone(),
                    },
                    ty,
                    expr.span,
                ))
            }
            ExprKind::Call { func, args } => {
                let Some(function) = BuiltinFunction::from_name(&func.text) else {
                    self.error(TypeError::UnknownFunction {
                        name: func.text.clone(),
                        span: func.span,
                    });
                    // Still visit the arguments so their errors are reported.
                    for arg in args {
                        self.check_expr(arg);
                    }
                    return None;
                };
                self.check_call(function, args, expr.span)
            }
        }
    }

    fn check_record_literal(&mut self, fields: &[RecordField], span: Span) -> Option<BoundExpr> {
        let mut bound = Vec::with_capacity(fields.len());
        let mut ok = true;
        for field in fields {
            match self.check_expr(&field.value) {
                Some(value) => bound.push((field.name.text.clone(), value)),
                None => ok = false,
            }
        }
        if !ok {
            return None;
        }
        let ty = FormulaType::record(bound.iter().map(|(name, v)| (name.clone(), v.ty.clone())));
        Some(BoundExpr::new(BoundKind::Record(bound), ty, span))
    }

    fn check_table_literal(&mut self, items: &[Expr], span: Span) -> Option<BoundExpr> {
        let mut rows: Vec<BoundExpr> = Vec::with_capacity(items.len());
        let mut ok = true;
        for item in items {
            let Some(value) = self.check_expr(item) else {
                ok = false;
                continue;
            };
            let row = match &value.ty {
                FormulaType::Record(_) => value,
                _ => {
                    let ty = FormulaType::record([(VALUE_FIELD, value.ty.clone())]);
                    let span = value.span;
                    BoundExpr::new(
                        BoundKind::Record(vec![(VALUE_FIELD.to_string(), value)]),
                        ty,
                        span,
                    )
                }
            };
            if let Some(first) = rows.first() {
                let (expected, found) = (first.ty.clone(), row.ty.clone());
                if check_compatible(&mut self.snapshots, &expected, &found).is_err() {
                    self.error(TypeError::Mismatch {
                        expected,
                        found,
                        origin: ConstraintOrigin::TableItem { item_span: row.span },
                    });
                    ok = false;
                    continue;
                }
            }
            rows.push(row);
        }
        if !ok {
            return None;
        }
        let element = match rows.first().map(|r| &r.ty) {
            Some(FormulaType::Record(rt)) => rt.clone(),
            _ => RecordType::anonymous(std::iter::empty::<(String, FormulaType)>()),
        };
        Some(BoundExpr::new(
            BoundKind::Table(rows),
            FormulaType::Table(element.to_table()),
            span,
        ))
    }

    // ── Calls ────────────────────────────────────────────────────────────

    fn check_call(
        &mut self,
        function: BuiltinFunction,
        args: &[Expr],
        span: Span,
    ) -> Option<BoundExpr> {
        let (min, max) = function.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            self.error(TypeError::ArityMismatch {
                function,
                min,
                max,
                found: args.len(),
                span,
            });
            return None;
        }
        if function.is_mutation() && !self.symbols.mutation_functions_enabled() {
            self.error(TypeError::MutationFunctionsDisabled { function, span });
            return None;
        }

        let (bound_args, ty) = match function {
            BuiltinFunction::Patch => self.check_patch(args, span)?,
            BuiltinFunction::Collect => self.check_collect(args)?,
            BuiltinFunction::Remove => self.check_remove(args)?,
            BuiltinFunction::Clear => {
                let (target, _) = self.mutation_target(function, &args[0])?;
                (vec![target], FormulaType::Void)
            }
            BuiltinFunction::Index => {
                let table = self.table_arg(function, &args[0]);
                let index = self.check_expr(&args[1]);
                let (table, elem) = table?;
                let index = index?;
                self.expect_type(&FormulaType::Number, &index, 1)?;
                (vec![table, index], elem)
            }
            BuiltinFunction::First | BuiltinFunction::Last => {
                let (table, elem) = self.table_arg(function, &args[0])?;
                (vec![table], elem)
            }
            BuiltinFunction::CountRows => {
                let (table, _) = self.table_arg(function, &args[0])?;
                (vec![table], FormulaType::Number)
            }
            BuiltinFunction::Blank => (Vec::new(), FormulaType::Blank),
        };

        Some(BoundExpr::new(
            BoundKind::Call {
                function,
                args: bound_args,
            },
            ty,
            span,
        ))
    }

    /// `Patch(table, selector, change, ...)` or `Patch(record, change, ...)`.
    fn check_patch(&mut self, args: &[Expr], span: Span) -> Option<(Vec<BoundExpr>, FormulaType)> {
        let function = BuiltinFunction::Patch;
        let target = self.check_expr(&args[0])?;

        match target.ty.clone() {
            FormulaType::Table(table) => {
                let name = match &target.kind {
                    BoundKind::Variable(name) => name.clone(),
                    _ => {
                        self.error(TypeError::InvalidMutationTarget {
                            function,
                            span: target.span,
                        });
                        return None;
                    }
                };
                self.require_mutable(function, &name, target.span)?;
                if args.len() < 3 {
                    self.error(TypeError::ArityMismatch {
                        function,
                        min: 3,
                        max: None,
                        found: args.len(),
                        span,
                    });
                    return None;
                }

                let element = table.element().clone();
                let selector = self.check_expr(&args[1]);
                let changes = self.check_changes(function, &element, &args[2..], false);
                let selector = selector?;
                self.check_selector(function, &element, &selector, &args[1], 1)?;
                let changes = changes?;

                let mut bound = vec![target, selector];
                bound.extend(changes);
                Some((bound, FormulaType::Record(element)))
            }
            FormulaType::Record(record) => {
                let changes = self.check_changes(function, &record, &args[1..], true)?;
                let ty = if record.type_name().is_some() {
                    FormulaType::Record(record)
                } else {
                    // Anonymous merge: the result has the union of all fields,
                    // later changes winning.
                    let mut merged = record.fields();
                    for change in &changes {
                        if let FormulaType::Record(rt) = &change.ty {
                            merged.extend(rt.fields());
                        }
                    }
                    FormulaType::record(merged)
                };
                let mut bound = vec![target];
                bound.extend(changes);
                Some((bound, ty))
            }
            _ => {
                self.error(TypeError::InvalidMutationTarget {
                    function,
                    span: target.span,
                });
                None
            }
        }
    }

    /// `Collect(table, record, ...)`.
    fn check_collect(&mut self, args: &[Expr]) -> Option<(Vec<BoundExpr>, FormulaType)> {
        let function = BuiltinFunction::Collect;
        let (target, table) = self.mutation_target(function, &args[0])?;
        let element = table.element().clone();
        let items = self.check_changes(function, &element, &args[1..], false)?;

        let ty = if items.len() == 1 {
            FormulaType::Record(element)
        } else {
            FormulaType::Table(table)
        };
        let mut bound = vec![target];
        bound.extend(items);
        Some((bound, ty))
    }

    /// `Remove(table, record, ...)`.
    fn check_remove(&mut self, args: &[Expr]) -> Option<(Vec<BoundExpr>, FormulaType)> {
        let function = BuiltinFunction::Remove;
        let (target, table) = self.mutation_target(function, &args[0])?;
        let element = table.element().clone();

        let mut bound = vec![target];
        let mut ok = true;
        for (offset, arg) in args[1..].iter().enumerate() {
            let Some(rec) = self.check_expr(arg) else {
                ok = false;
                continue;
            };
            match self.check_selector(function, &element, &rec, arg, offset + 1) {
                Some(()) => bound.push(rec),
                None => ok = false,
            }
        }
        ok.then_some((bound, FormulaType::Void))
    }

    // ── Mutation helpers ─────────────────────────────────────────────────

    /// Resolve the first argument of `Collect`, `Remove` or `Clear`: a
    /// mutable table variable.
    fn mutation_target(
        &mut self,
        function: BuiltinFunction,
        expr: &Expr,
    ) -> Option<(BoundExpr, TableType)> {
        let Some(name) = expr.as_ident() else {
            // Still check the expression so unrelated errors surface.
            self.check_expr(expr);
            self.error(TypeError::InvalidMutationTarget {
                function,
                span: expr.span,
            });
            return None;
        };
        let target = self.check_expr(expr)?;
        let table = match &target.ty {
            FormulaType::Table(table) => table.clone(),
            other => {
                self.error(TypeError::ExpectedTable {
                    function,
                    found: other.clone(),
                    span: expr.span,
                });
                return None;
            }
        };
        self.require_mutable(function, &name.text, expr.span)?;
        Some((target, table))
    }

    fn require_mutable(&mut self, function: BuiltinFunction, name: &str, span: Span) -> Option<()> {
        match self.symbols.lookup(name) {
            Some(entry) if entry.mutable => Some(()),
            _ => {
                self.error(TypeError::ReadOnlyTarget {
                    function,
                    name: name.to_string(),
                    span,
                });
                None
            }
        }
    }

    /// A selector must be a record that fits the target's element type. It
    /// never extends the descriptor.
    fn check_selector(
        &mut self,
        function: BuiltinFunction,
        element: &RecordType,
        selector: &BoundExpr,
        source: &Expr,
        param_idx: usize,
    ) -> Option<()> {
        match &selector.ty {
            FormulaType::Record(_) | FormulaType::Blank | FormulaType::Unknown => {}
            other => {
                self.error(TypeError::ExpectedRecord {
                    function,
                    found: other.clone(),
                    span: selector.span,
                });
                return None;
            }
        }
        let expected = FormulaType::Record(element.clone());
        match check_compatible(&mut self.snapshots, &expected, &selector.ty) {
            Ok(()) => Some(()),
            Err(incompat) => {
                self.report_incompat(element, incompat, source, param_idx);
                None
            }
        }
    }

    /// Check change records against the target element type, registering
    /// new fields into open descriptors. With `merge`, new fields on an
    /// anonymous target are accepted and simply widen the result.
    fn check_changes(
        &mut self,
        function: BuiltinFunction,
        element: &RecordType,
        args: &[Expr],
        merge: bool,
    ) -> Option<Vec<BoundExpr>> {
        let mut bound = Vec::with_capacity(args.len());
        let mut ok = true;
        for arg in args {
            let Some(change) = self.check_expr(arg) else {
                ok = false;
                continue;
            };
            if self.check_change(function, element, &change, arg, merge) {
                bound.push(change);
            } else {
                ok = false;
            }
        }
        ok.then_some(bound)
    }

    fn check_change(
        &mut self,
        function: BuiltinFunction,
        element: &RecordType,
        change: &BoundExpr,
        source: &Expr,
        merge: bool,
    ) -> bool {
        let change_ty = match &change.ty {
            FormulaType::Record(rt) => rt.clone(),
            FormulaType::Blank | FormulaType::Unknown => return true,
            other => {
                self.error(TypeError::ExpectedRecord {
                    function,
                    found: other.clone(),
                    span: change.span,
                });
                return false;
            }
        };
        if element.type_name().is_some() && *element == change_ty {
            return true;
        }

        let mut ok = true;
        for (name, found) in self.snapshots.fields(&change_ty) {
            let span = field_span(source, &name);
            match self.snapshots.field_type(element, &name) {
                Some(expected) => {
                    if check_compatible(&mut self.snapshots, &expected, &found).is_err() {
                        self.error(TypeError::FieldTypeMismatch {
                            field_name: name,
                            expected,
                            found,
                            span,
                        });
                        ok = false;
                    }
                }
                None if merge && element.descriptor_key().is_none() => {}
                None if element.is_extensible() => {
                    let ty = match found {
                        FormulaType::Blank => FormulaType::Unknown,
                        other => other,
                    };
                    self.snapshots.register(element, &name, ty);
                }
                None => {
                    self.error(TypeError::UnknownField {
                        type_name: element.to_string(),
                        field_name: name,
                        span,
                    });
                    ok = false;
                }
            }
        }
        ok
    }

    fn report_incompat(
        &mut self,
        element: &RecordType,
        incompat: Incompatibility,
        source: &Expr,
        param_idx: usize,
    ) {
        let err = match incompat {
            Incompatibility::Shape { expected, found } => TypeError::Mismatch {
                expected,
                found,
                origin: ConstraintOrigin::FnArg {
                    call_site: source.span,
                    param_idx,
                },
            },
            Incompatibility::UnknownField { field } => TypeError::UnknownField {
                type_name: element.to_string(),
                span: field_span(source, &field),
                field_name: field,
            },
            Incompatibility::FieldType {
                field,
                expected,
                found,
            } => TypeError::FieldTypeMismatch {
                span: field_span(source, &field),
                field_name: field,
                expected,
                found,
            },
        };
        self.error(err);
    }

    // ── Plain argument helpers ───────────────────────────────────────────

    /// Check a table-valued argument of a non-mutating function. Returns the
    /// bound argument and the element record type (as a `FormulaType`).
    fn table_arg(&mut self, function: BuiltinFunction, expr: &Expr) -> Option<(BoundExpr, FormulaType)> {
        let bound = self.check_expr(expr)?;
        let elem = match &bound.ty {
            FormulaType::Table(table) => FormulaType::Record(table.element().clone()),
            FormulaType::Blank | FormulaType::Unknown => FormulaType::Unknown,
            other => {
                self.error(TypeError::ExpectedTable {
                    function,
                    found: other.clone(),
                    span: expr.span,
                });
                return None;
            }
        };
        Some((bound, elem))
    }

    fn expect_type(&mut self, expected: &FormulaType, arg: &BoundExpr, param_idx: usize) -> Option<()> {
        if check_compatible(&mut self.snapshots, expected, &arg.ty).is_ok() {
            return Some(());
        }
        self.error(TypeError::Mismatch {
            expected: expected.clone(),
            found: arg.ty.clone(),
            origin: ConstraintOrigin::FnArg {
                call_site: arg.span,
                param_idx,
            },
        });
        None
    }
}

/// Span of `name` inside a record literal, or the whole expression.
fn field_span(expr: &Expr, name: &str) -> Span {
    match &expr.kind {
        ExprKind::Record(fields) => fields
            .iter()
            .find(|f| f.name.text == name)
            .map(|f| f.name.span)
            .unwrap_or(expr.span),
        _ => expr.span,
    }
}
