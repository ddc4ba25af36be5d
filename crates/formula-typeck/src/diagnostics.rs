//! Ariadne-based diagnostic rendering for type errors.
//!
//! Renders `TypeError` variants into labeled error reports, or into one JSON
//! object per error for tooling.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use formula_common::span::Span;

use crate::error::{ConstraintOrigin, TypeError};

/// Output options shared by the CLI and hosts.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiagnosticOptions {
    pub color: bool,
    pub json: bool,
}

impl DiagnosticOptions {
    /// Plain text output, for tests and piped stderr.
    pub fn colorless() -> Self {
        DiagnosticOptions {
            color: false,
            json: false,
        }
    }
}

// ── Error Codes ────────────────────────────────────────────────────────

/// Assign a stable code to each TypeError variant.
pub fn error_code(err: &TypeError) -> &'static str {
    match err {
        TypeError::Syntax { .. } => "F0001",
        TypeError::UnboundVariable { .. } => "F0002",
        TypeError::UnknownFunction { .. } => "F0003",
        TypeError::ArityMismatch { .. } => "F0004",
        TypeError::Mismatch { .. } => "F0005",
        TypeError::ReadOnlyTarget { .. } => "F0006",
        TypeError::InvalidMutationTarget { .. } => "F0007",
        TypeError::MutationFunctionsDisabled { .. } => "F0008",
        TypeError::UnknownField { .. } | TypeError::NoSuchField { .. } => "F0009",
        TypeError::FieldTypeMismatch { .. } => "F0010",
        TypeError::ExpectedTable { .. } | TypeError::ExpectedRecord { .. } => "F0011",
    }
}

/// Short label text placed under the primary span.
fn primary_label(err: &TypeError) -> String {
    match err {
        TypeError::Syntax { .. } => "here".to_string(),
        TypeError::UnboundVariable { .. } => "not found in any symbol table".to_string(),
        TypeError::UnknownFunction { .. } => "unknown function".to_string(),
        TypeError::ArityMismatch { found, .. } => format!("called with {} argument(s)", found),
        TypeError::Mismatch {
            expected, found, ..
        } => format!("expected {}, found {}", expected, found),
        TypeError::ReadOnlyTarget { .. } => "read-only variable".to_string(),
        TypeError::InvalidMutationTarget { .. } => "not a table variable".to_string(),
        TypeError::MutationFunctionsDisabled { .. } => "mutation call".to_string(),
        TypeError::UnknownField { type_name, .. } => format!("not a field of {}", type_name),
        TypeError::FieldTypeMismatch { expected, .. } => format!("expected {}", expected),
        TypeError::NoSuchField { .. } => "unknown field".to_string(),
        TypeError::ExpectedTable { found, .. } | TypeError::ExpectedRecord { found, .. } => {
            format!("this is {}", found)
        }
    }
}

fn help(err: &TypeError) -> Option<&'static str> {
    match err {
        TypeError::ReadOnlyTarget { .. } => Some("declare the variable as mutable"),
        TypeError::MutationFunctionsDisabled { .. } => {
            Some("enable mutation functions in the engine configuration")
        }
        TypeError::UnknownField { .. } => {
            Some("register the field on the record type, or make the type open")
        }
        _ => None,
    }
}

fn related(err: &TypeError) -> Option<(&str, Span)> {
    match err {
        TypeError::Syntax {
            related: Some((msg, span)),
            ..
        } => Some((msg.as_str(), *span)),
        _ => None,
    }
}

// ── Span Helpers ───────────────────────────────────────────────────────

/// Clamp a span into the source and widen empty spans to one character so
/// ariadne has something to underline.
fn clamp(span: Span, source_len: usize) -> Range<usize> {
    let s = (span.start as usize).min(source_len);
    let e = (span.end as usize).min(source_len).max(s);
    if s == e {
        s..e.saturating_add(1).min(source_len.max(s))
    } else {
        s..e
    }
}

fn primary_span(err: &TypeError, source_len: usize) -> Range<usize> {
    match err.span() {
        Some(span) => clamp(span, source_len),
        None => 0..source_len,
    }
}

// ── Rendering ──────────────────────────────────────────────────────────

/// Render a type error into a formatted diagnostic string using ariadne.
///
/// With `options.color` unset the output is plain text, which keeps test
/// assertions stable.
pub fn render_diagnostic(
    error: &TypeError,
    source: &str,
    filename: &str,
    options: &DiagnosticOptions,
) -> String {
    if options.json {
        return render_json(error, filename).to_string();
    }

    let config = Config::default().with_color(options.color);
    let span = primary_span(error, source.len());
    let code = error_code(error);

    let mut builder = Report::build(ReportKind::Error, span.clone())
        .with_code(code)
        .with_message(error.to_string())
        .with_config(config)
        .with_label(
            Label::new(span)
                .with_message(primary_label(error))
                .with_color(Color::Red),
        );

    if let TypeError::Mismatch {
        origin: ConstraintOrigin::FnArg { param_idx, .. },
        ..
    } = error
    {
        builder.set_note(format!("in argument {}", param_idx + 1));
    }
    if let Some((msg, rel)) = related(error) {
        builder.add_label(
            Label::new(clamp(rel, source.len()))
                .with_message(msg)
                .with_color(Color::Blue),
        );
    }
    if let Some(help) = help(error) {
        builder.set_help(help);
    }

    let mut buf = Vec::new();
    builder
        .finish()
        .write(Source::from(source), &mut buf)
        .ok();
    String::from_utf8_lossy(&buf).into_owned()
}

/// One JSON object describing the error, for `--json` output.
pub fn render_json(error: &TypeError, filename: &str) -> serde_json::Value {
    let spans: Vec<serde_json::Value> = error
        .span()
        .into_iter()
        .map(|span| {
            serde_json::json!({
                "start": span.start,
                "end": span.end,
                "label": primary_label(error),
            })
        })
        .chain(related(error).map(|(msg, span)| {
            serde_json::json!({
                "start": span.start,
                "end": span.end,
                "label": msg,
            })
        }))
        .collect();

    serde_json::json!({
        "code": error_code(error),
        "severity": "error",
        "message": error.to_string(),
        "file": filename,
        "spans": spans,
        "fix": help(error),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinFunction;

    #[test]
    fn codes_are_distinct_per_family() {
        let read_only = TypeError::ReadOnlyTarget {
            function: BuiltinFunction::Patch,
            name: "V".into(),
            span: Span::new(6, 7),
        };
        let disabled = TypeError::MutationFunctionsDisabled {
            function: BuiltinFunction::Patch,
            span: Span::new(0, 5),
        };
        assert_eq!(error_code(&read_only), "F0006");
        assert_eq!(error_code(&disabled), "F0008");
    }

    #[test]
    fn plain_render_contains_code_message_and_help() {
        let source = "Patch(V, First(V), {A: 1})";
        let err = TypeError::ReadOnlyTarget {
            function: BuiltinFunction::Patch,
            name: "V".into(),
            span: Span::new(6, 7),
        };
        let out = render_diagnostic(&err, source, "formula", &DiagnosticOptions::colorless());
        assert!(out.contains("F0006"), "{}", out);
        assert!(out.contains("`Patch` cannot modify `V`: the variable is read-only"), "{}", out);
        assert!(out.contains("read-only variable"), "{}", out);
        assert!(out.contains("declare the variable as mutable"), "{}", out);
    }

    #[test]
    fn empty_span_at_end_of_source_does_not_panic() {
        let source = "First(";
        let err = TypeError::Syntax {
            message: "expected expression, found end of input".into(),
            span: Span::new(6, 6),
            related: Some(("opened here".into(), Span::new(5, 6))),
        };
        let out = render_diagnostic(&err, source, "formula", &DiagnosticOptions::colorless());
        assert!(out.contains("expected expression"), "{}", out);
    }

    #[test]
    fn json_shape() {
        let err = TypeError::UnknownField {
            type_name: "Pad".into(),
            field_name: "Nope".into(),
            span: Span::new(10, 14),
        };
        let json = render_json(&err, "formula");
        insta::assert_snapshot!(json.to_string(), @r###"{"code":"F0009","fix":"register the field on the record type, or make the type open","file":"formula","message":"`Pad` has no field `Nope`","severity":"error","spans":[{"end":14,"label":"not a field of Pad","start":10}]}"###);
    }
}
