//! Runtime values.
//!
//! Values print in formula literal syntax (`{Prop1: "a"}`, `[{...}]`,
//! `Blank()`), which is what the CLI shows and what tests compare against.
//! Error values are ordinary values: functions receive them as arguments and
//! hand them back unchanged.

use std::collections::BTreeMap;
use std::fmt;

use formula_common::error::{ErrorKind, ErrorSeverity};
use formula_common::span::Span;
use formula_typeck::ty::{FormulaType, RecordType, TableType};

/// A formula value.
#[derive(Clone, Debug, PartialEq)]
pub enum FormulaValue {
    Blank,
    Boolean(bool),
    Number(f64),
    Text(String),
    Void,
    Record(RecordValue),
    Table(TableValue),
    Error(ErrorValue),
}

impl FormulaValue {
    pub fn error(err: ExpressionError) -> FormulaValue {
        FormulaValue::Error(ErrorValue::new(err))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            FormulaValue::Record(rec) => Some(rec),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableValue> {
        match self {
            FormulaValue::Table(table) => Some(table),
            _ => None,
        }
    }

    /// The type of this value. Error values have no useful type.
    pub fn ty(&self) -> FormulaType {
        match self {
            FormulaValue::Blank => FormulaType::Blank,
            FormulaValue::Boolean(_) => FormulaType::Boolean,
            FormulaValue::Number(_) => FormulaType::Number,
            FormulaValue::Text(_) => FormulaType::Text,
            FormulaValue::Void => FormulaType::Void,
            FormulaValue::Record(rec) => FormulaType::Record(rec.ty.clone()),
            FormulaValue::Table(table) => FormulaType::Table(table.ty.clone()),
            FormulaValue::Error(_) => FormulaType::Unknown,
        }
    }

    /// JSON rendering for tooling. `Blank` and `Void` become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FormulaValue::Blank | FormulaValue::Void => serde_json::Value::Null,
            FormulaValue::Boolean(b) => serde_json::Value::Bool(*b),
            FormulaValue::Number(n) => serde_json::Value::from(*n),
            FormulaValue::Text(s) => serde_json::Value::String(s.clone()),
            FormulaValue::Record(rec) => rec.to_json(),
            FormulaValue::Table(table) => {
                serde_json::Value::Array(table.rows.iter().map(RecordValue::to_json).collect())
            }
            FormulaValue::Error(err) => serde_json::json!({
                "errors": err.errors.iter().map(|e| serde_json::json!({
                    "kind": e.kind.to_string(),
                    "code": e.kind.code(),
                    "severity": e.severity.to_string(),
                    "message": e.message,
                })).collect::<Vec<_>>(),
            }),
        }
    }
}

impl fmt::Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaValue::Blank => write!(f, "Blank()"),
            FormulaValue::Boolean(b) => write!(f, "{}", b),
            FormulaValue::Number(n) => write!(f, "{}", n),
            FormulaValue::Text(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            FormulaValue::Void => write!(f, "Void"),
            FormulaValue::Record(rec) => write!(f, "{}", rec),
            FormulaValue::Table(table) => write!(f, "{}", table),
            FormulaValue::Error(err) => write!(f, "{}", err),
        }
    }
}

// ── Records ────────────────────────────────────────────────────────────

/// A record value together with its record type.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordValue {
    pub ty: RecordType,
    pub fields: BTreeMap<String, FormulaValue>,
}

impl RecordValue {
    pub fn new(ty: RecordType, fields: BTreeMap<String, FormulaValue>) -> Self {
        RecordValue { ty, fields }
    }

    /// A record whose anonymous type is derived from its field values.
    pub fn anonymous<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, FormulaValue)>,
        S: Into<String>,
    {
        let fields: BTreeMap<String, FormulaValue> =
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let ty = RecordType::anonymous(fields.iter().map(|(k, v)| (k.clone(), v.ty())));
        RecordValue { ty, fields }
    }

    /// Field value; missing fields read as `Blank`.
    pub fn get(&self, name: &str) -> FormulaValue {
        self.fields.get(name).cloned().unwrap_or(FormulaValue::Blank)
    }

    /// Overwrite this record's fields with those of `change`.
    pub fn merge(&mut self, change: &RecordValue) {
        for (name, value) in &change.fields {
            self.fields.insert(name.clone(), value.clone());
        }
    }

    /// Whether every field of `selector` equals the same field here.
    /// Fields this record lacks compare as `Blank`.
    pub fn matches(&self, selector: &RecordValue) -> bool {
        selector
            .fields
            .iter()
            .all(|(name, value)| self.get(name) == *value)
    }

    /// Re-type this record as `ty`, filling fields `ty` knows about but the
    /// record lacks with `Blank`.
    pub fn conform_to(mut self, ty: &RecordType) -> Self {
        for name in ty.field_names() {
            self.fields.entry(name).or_insert(FormulaValue::Blank);
        }
        self.ty = ty.clone();
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write_field_name(f, name)?;
            write!(f, ": {}", value)?;
        }
        write!(f, "}}")
    }
}

fn write_field_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let plain = name.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if plain {
        write!(f, "{}", name)
    } else {
        write!(f, "'{}'", name.replace('\'', "''"))
    }
}

// ── Tables ─────────────────────────────────────────────────────────────

/// A table value.
///
/// `source` names the store table the rows were read from. Only sourced
/// tables can be handed to mutation functions.
#[derive(Clone, Debug, PartialEq)]
pub struct TableValue {
    pub ty: TableType,
    pub rows: Vec<RecordValue>,
    pub source: Option<String>,
}

impl TableValue {
    pub fn new(ty: TableType, rows: Vec<RecordValue>) -> Self {
        TableValue {
            ty,
            rows,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for TableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", row)?;
        }
        write!(f, "]")
    }
}

// ── Errors ─────────────────────────────────────────────────────────────

/// One runtime error.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpressionError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub span: Option<Span>,
}

impl ExpressionError {
    /// A `Severe` error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ExpressionError {
            kind,
            severity: ErrorSeverity::Severe,
            message: message.into(),
            span: None,
        }
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ExpressionError::new(ErrorKind::InvalidArgument, message)
    }

    /// The error reported when an invocation observes cancellation before
    /// its store commit.
    pub fn cancelled() -> Self {
        ExpressionError::new(ErrorKind::Timeout, "operation was cancelled")
    }
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.kind, self.severity, self.message)
    }
}

impl std::error::Error for ExpressionError {}

/// An error value: one or more errors travelling through evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorValue {
    pub errors: Vec<ExpressionError>,
}

impl ErrorValue {
    pub fn new(err: ExpressionError) -> Self {
        ErrorValue { errors: vec![err] }
    }

    pub fn first(&self) -> Option<&ExpressionError> {
        self.errors.first()
    }
}

impl From<ExpressionError> for ErrorValue {
    fn from(err: ExpressionError) -> Self {
        ErrorValue::new(err)
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error(")?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(p1: &str, p2: &str) -> RecordValue {
        RecordValue::anonymous([
            ("Prop1", FormulaValue::Text(p1.into())),
            ("Prop2", FormulaValue::Text(p2.into())),
        ])
    }

    #[test]
    fn display_in_literal_syntax() {
        let table = TableValue::new(pad("a", "b").ty.to_table(), vec![pad("a", "b"), pad("c", "say \"hi\"")]);
        insta::assert_snapshot!(
            FormulaValue::Table(table).to_string(),
            @r###"[{Prop1: "a", Prop2: "b"}, {Prop1: "c", Prop2: "say ""hi"""}]"###
        );
        insta::assert_snapshot!(FormulaValue::Number(1.5).to_string(), @"1.5");
        insta::assert_snapshot!(FormulaValue::Number(2.0).to_string(), @"2");
        insta::assert_snapshot!(FormulaValue::Blank.to_string(), @"Blank()");

        let odd = RecordValue::anonymous([("Order Lines", FormulaValue::Boolean(true))]);
        insta::assert_snapshot!(odd.to_string(), @"{'Order Lines': true}");
    }

    #[test]
    fn selector_matching_and_merge() {
        let mut row = pad("a", "b");
        assert!(row.matches(&RecordValue::anonymous([("Prop1", FormulaValue::Text("a".into()))])));
        assert!(!row.matches(&RecordValue::anonymous([("Prop1", FormulaValue::Text("x".into()))])));
        assert!(row.matches(&RecordValue::anonymous([("Missing", FormulaValue::Blank)])));

        row.merge(&RecordValue::anonymous([("Prop2", FormulaValue::Text("haha".into()))]));
        assert_eq!(row.get("Prop2"), FormulaValue::Text("haha".into()));
        assert_eq!(row.get("Prop1"), FormulaValue::Text("a".into()));
    }

    #[test]
    fn error_display_and_json() {
        let err = ExpressionError::new(ErrorKind::ReadOnlyValue, "Something went wrong")
            .with_severity(ErrorSeverity::Critical);
        let value = FormulaValue::error(err);
        insta::assert_snapshot!(value.to_string(), @"Error(ReadOnlyValue (critical): Something went wrong)");
        assert_eq!(value.to_json()["errors"][0]["code"], 10);
        assert!(value.is_error());
        assert_eq!(value.ty(), FormulaType::Unknown);
    }

    #[test]
    fn cancelled_error_shape() {
        let err = ExpressionError::cancelled();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.severity, ErrorSeverity::Severe);
        assert_eq!(err.message, "operation was cancelled");
    }
}
