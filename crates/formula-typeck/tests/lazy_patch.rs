//! Integration tests for checking mutation calls against lazily-registered
//! record types.
//!
//! These tests exercise:
//! - `Patch` on a table whose element descriptor is populated at runtime
//! - Mutability and mutation-function gating
//! - Open descriptors being extended by the checker, sealed ones rejecting
//! - `Collect`, `Remove`, `Clear` and the non-mutating table builtins

use std::sync::Arc;

use formula_common::span::Span;
use formula_typeck::error::TypeError;
use formula_typeck::record::{LazyRecordType, RecordDescriptor};
use formula_typeck::symbols::SymbolTable;
use formula_typeck::ty::{FormulaType, RecordType};
use formula_typeck::CheckResult;

// ── Helpers ────────────────────────────────────────────────────────────

const PATCH: &str = r#"Patch(NewVar, Index(NewVar, 1), {Prop2: "haha"})"#;

/// `CustomPadType { Prop1: Text, Prop2: Text }`, registered after creation
/// the way a host discovers its schema.
fn pad_type(sealed: bool) -> Arc<LazyRecordType> {
    let lazy = if sealed {
        LazyRecordType::sealed("CustomPadType")
    } else {
        LazyRecordType::new("CustomPadType")
    };
    lazy.register_field("Prop1", FormulaType::Text);
    lazy.register_field("Prop2", FormulaType::Text);
    Arc::new(lazy)
}

fn table_of(lazy: &Arc<LazyRecordType>) -> FormulaType {
    FormulaType::Table(RecordType::from(lazy.clone()).to_table())
}

/// Symbol table with `NewVar: Table(CustomPadType)` and mutation functions on.
fn symbols(lazy: &Arc<LazyRecordType>, mutable: bool) -> SymbolTable {
    let mut table = SymbolTable::new();
    table.add_variable("NewVar", table_of(lazy), mutable).unwrap();
    table.enable_mutation_functions();
    table
}

fn check_source(src: &str, table: &SymbolTable) -> CheckResult {
    let parse = formula_parser::parse(src);
    formula_typeck::check(&parse, &[table])
}

fn assert_result_type(result: &CheckResult, expected: &str) {
    assert!(
        result.errors.is_empty(),
        "expected no errors, got: {:?}",
        result.errors
    );
    let actual = result
        .result_type
        .as_ref()
        .expect("expected a result type");
    assert_eq!(actual.to_string(), expected);
}

fn assert_has_error<F: Fn(&TypeError) -> bool>(result: &CheckResult, pred: F, desc: &str) {
    assert!(
        result.errors.iter().any(|e| pred(e)),
        "expected error matching `{}`, got errors: {:?}",
        desc,
        result.errors
    );
}

// ── Patch ──────────────────────────────────────────────────────────────

#[test]
fn test_patch_lazy_record_type() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, true);
    let result = check_source(PATCH, &table);
    assert_result_type(&result, "CustomPadType");
    assert!(result.bound.is_some());
}

#[test]
fn test_check_call_entry_point() {
    let lazy = pad_type(true);
    let table = symbols(&lazy, true);
    let parse = formula_parser::parse(PATCH);
    let expr = parse.expr().unwrap();
    assert_eq!(formula_typeck::check_call(expr, &table), Ok(()));
}

#[test]
fn test_patch_immutable_target_fails() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, false);
    let parse = formula_parser::parse(PATCH);
    let failure = formula_typeck::check_call(parse.expr().unwrap(), &table).unwrap_err();
    assert_eq!(
        failure.message,
        "`Patch` cannot modify `NewVar`: the variable is read-only"
    );
    assert_eq!(failure.span, Some(Span::new(6, 12)));
}

#[test]
fn test_patch_without_mutation_functions() {
    let lazy = pad_type(false);
    let mut table = SymbolTable::new();
    table.add_variable("NewVar", table_of(&lazy), true).unwrap();
    let result = check_source(PATCH, &table);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::MutationFunctionsDisabled { .. }),
        "MutationFunctionsDisabled",
    );
}

#[test]
fn test_mutation_switch_on_outer_table() {
    let lazy = pad_type(false);
    let mut engine = SymbolTable::new();
    engine.enable_mutation_functions();
    let mut call = SymbolTable::new();
    call.add_variable("NewVar", table_of(&lazy), true).unwrap();

    let parse = formula_parser::parse(PATCH);
    let result = formula_typeck::check(&parse, &[&engine, &call]);
    assert!(result.is_success(), "{:?}", result.errors);
}

#[test]
fn test_open_descriptor_is_extended_by_the_checker() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, true);
    assert_eq!(lazy.field_type("Prop3"), None);

    let result = check_source(r#"Patch(NewVar, First(NewVar), {Prop3: 42})"#, &table);
    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(lazy.field_type("Prop3"), Some(FormulaType::Number));
    assert_eq!(lazy.field_names().len(), 3);
}

#[test]
fn test_failed_check_leaves_the_descriptor_unchanged() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, true);

    // Bad selector after a valid change record.
    let result = check_source(r#"Patch(NewVar, 5, {Fresh: 1})"#, &table);
    assert!(!result.is_success());
    assert_eq!(lazy.field_type("Fresh"), None);

    // Later field of the same change record fails.
    let result = check_source(
        r#"Patch(NewVar, First(NewVar), {Fresh: 1, Prop2: 5})"#,
        &table,
    );
    assert!(!result.is_success());
    assert_eq!(lazy.field_type("Fresh"), None);
    assert_eq!(lazy.field_names().len(), 2);

    // The rejected formulas did not pin `Fresh` to Number.
    let result = check_source(r#"Patch(NewVar, First(NewVar), {Fresh: "x"})"#, &table);
    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(lazy.field_type("Fresh"), Some(FormulaType::Text));
}

#[test]
fn test_extension_is_visible_later_in_the_same_pass() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, true);
    let result = check_source(
        r#"Patch(NewVar, First(NewVar), {New: 1}, {New: "one"})"#,
        &table,
    );
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::FieldTypeMismatch { field_name, .. } if field_name == "New"),
        "FieldTypeMismatch on New",
    );
}

#[test]
fn test_sealed_descriptor_rejects_unknown_field() {
    let lazy = pad_type(true);
    let table = symbols(&lazy, true);
    let src = r#"Patch(NewVar, First(NewVar), {Prop3: "x"})"#;
    let result = check_source(src, &table);
    assert_eq!(
        result.errors,
        vec![TypeError::UnknownField {
            type_name: "CustomPadType".into(),
            field_name: "Prop3".into(),
            span: Span::new(30, 35),
        }]
    );
    assert_eq!(lazy.field_type("Prop3"), None);
}

#[test]
fn test_host_registration_is_seen_by_the_next_pass() {
    let lazy = pad_type(true);
    let table = symbols(&lazy, true);
    let src = r#"Patch(NewVar, First(NewVar), {Prop3: "x"})"#;
    assert!(!check_source(src, &table).is_success());

    lazy.register_field("Prop3", FormulaType::Text);
    assert!(check_source(src, &table).is_success());
}

#[test]
fn test_change_field_type_mismatch() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, true);
    let result = check_source(r#"Patch(NewVar, First(NewVar), {Prop2: 5})"#, &table);
    assert_has_error(
        &result,
        |e| {
            matches!(e, TypeError::FieldTypeMismatch { expected: FormulaType::Text, found: FormulaType::Number, .. })
        },
        "FieldTypeMismatch Text/Number",
    );
}

#[test]
fn test_literal_selector_is_matched_field_by_field() {
    let lazy = pad_type(true);
    let table = symbols(&lazy, true);
    let ok = check_source(r#"Patch(NewVar, {Prop1: "a"}, {Prop2: "b"})"#, &table);
    assert!(ok.is_success(), "{:?}", ok.errors);

    let bad = check_source(r#"Patch(NewVar, {Prop1: 1}, {Prop2: "b"})"#, &table);
    assert_has_error(
        &bad,
        |e| matches!(e, TypeError::FieldTypeMismatch { field_name, .. } if field_name == "Prop1"),
        "FieldTypeMismatch on selector",
    );
}

#[test]
fn test_selector_never_extends_the_descriptor() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, true);
    let result = check_source(r#"Patch(NewVar, {Ghost: 1}, {Prop2: "b"})"#, &table);
    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(lazy.field_type("Ghost"), None);
}

#[test]
fn test_same_named_descriptors_are_interchangeable() {
    let lazy = pad_type(true);
    // Another host call site describing the same external type.
    let other = Arc::new(LazyRecordType::sealed("custompadtype"));
    let mut table = symbols(&lazy, true);
    table
        .add_variable("Row", FormulaType::Record(RecordType::from(other)), false)
        .unwrap();

    let result = check_source(r#"Patch(NewVar, Row, Row)"#, &table);
    assert!(result.is_success(), "{:?}", result.errors);
}

#[test]
fn test_patch_needs_a_change_record_for_tables() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, true);
    let result = check_source("Patch(NewVar, First(NewVar))", &table);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::ArityMismatch { min: 3, found: 2, .. }),
        "ArityMismatch",
    );
}

#[test]
fn test_patch_record_merge() {
    let table = {
        let mut t = SymbolTable::new();
        t.enable_mutation_functions();
        t
    };
    let result = check_source(r#"Patch({a: 1}, {b: "x"}, {a: 2})"#, &table);
    assert_result_type(&result, "{a: Number, b: Text}");

    let bad = check_source(r#"Patch({a: 1}, {a: "x"})"#, &table);
    assert_has_error(
        &bad,
        |e| matches!(e, TypeError::FieldTypeMismatch { .. }),
        "FieldTypeMismatch",
    );
}

#[test]
fn test_patch_target_must_be_a_variable() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, true);
    let result = check_source(r#"Patch([{Prop1: "a"}], First(NewVar), {Prop2: "b"})"#, &table);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::InvalidMutationTarget { .. }),
        "InvalidMutationTarget",
    );
}

// ── Other mutation functions ───────────────────────────────────────────

#[test]
fn test_collect_remove_clear() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, true);

    let one = check_source(r#"Collect(NewVar, {Prop1: "x"})"#, &table);
    assert_result_type(&one, "CustomPadType");

    let many = check_source(r#"Collect(NewVar, {Prop1: "x"}, {Prop2: "y"})"#, &table);
    assert_result_type(&many, "Table(CustomPadType)");

    let remove = check_source(r#"Remove(NewVar, First(NewVar))"#, &table);
    assert_result_type(&remove, "Void");

    let clear = check_source("Clear(NewVar)", &table);
    assert_result_type(&clear, "Void");
}

#[test]
fn test_family_requires_mutable_table_variable() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, false);
    for src in [
        r#"Collect(NewVar, {Prop1: "x"})"#,
        r#"Remove(NewVar, First(NewVar))"#,
        "Clear(NewVar)",
    ] {
        let result = check_source(src, &table);
        assert_has_error(
            &result,
            |e| matches!(e, TypeError::ReadOnlyTarget { .. }),
            src,
        );
    }

    let writable = symbols(&lazy, true);
    let result = check_source("Clear(First(NewVar))", &writable);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::InvalidMutationTarget { .. }),
        "InvalidMutationTarget",
    );
}

// ── Non-mutating builtins and name resolution ──────────────────────────

#[test]
fn test_table_builtins() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, false);
    assert_result_type(&check_source("CountRows(NewVar)", &table), "Number");
    assert_result_type(&check_source("Last(NewVar)", &table), "CustomPadType");
    assert_result_type(&check_source("First(NewVar).Prop1", &table), "Text");
    assert_result_type(&check_source("First(NewVar).NotYet", &table), "Unknown");
    assert_result_type(&check_source("Blank()", &table), "Blank");
    assert_result_type(&check_source("CountRows([1, 2, 3])", &table), "Number");
}

#[test]
fn test_index_argument_types() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, true);
    let src = r#"Patch(NewVar, Index(NewVar, "one"), {Prop2: "haha"})"#;
    let result = check_source(src, &table);
    assert_has_error(
        &result,
        |e| {
            matches!(e, TypeError::Mismatch { expected: FormulaType::Number, found: FormulaType::Text, .. })
                && e.span() == Some(Span::new(28, 33))
        },
        "Mismatch Number/Text",
    );

    let result = check_source("Index(42, 1)", &table);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::ExpectedTable { .. }),
        "ExpectedTable",
    );
}

#[test]
fn test_name_resolution_errors() {
    let lazy = pad_type(false);
    let table = symbols(&lazy, true);

    let result = check_source("CountRows(Missing)", &table);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::UnboundVariable { name, .. } if name == "Missing"),
        "UnboundVariable",
    );

    // Unknown functions still report errors inside their arguments.
    let result = check_source("Sum(Missing)", &table);
    assert_eq!(result.errors.len(), 2, "{:?}", result.errors);

    let result = check_source("First(NewVar, NewVar)", &table);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::ArityMismatch { found: 2, .. }),
        "ArityMismatch",
    );
}

#[test]
fn test_sealed_field_access() {
    let lazy = pad_type(true);
    let table = symbols(&lazy, false);
    let result = check_source("First(NewVar).Nope", &table);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::NoSuchField { field_name, .. } if field_name == "Nope"),
        "NoSuchField",
    );
}

#[test]
fn test_mixed_table_literal() {
    let table = SymbolTable::new();
    let result = check_source(r#"CountRows([1, "two"])"#, &table);
    assert_has_error(
        &result,
        |e| matches!(e, TypeError::Mismatch { .. }),
        "Mismatch",
    );
}

#[test]
fn test_syntax_errors_short_circuit() {
    let table = SymbolTable::new();
    let result = check_source("Patch(NewVar,", &table);
    assert!(!result.is_success());
    assert!(matches!(result.errors[0], TypeError::Syntax { .. }));
}
