use formula_common::error::LexErrorKind;
use formula_common::token::TokenKind;
use formula_lexer::Lexer;

/// Render tokens one per line as `Kind "text" start..end` for snapshotting.
fn render(source: &str) -> String {
    Lexer::tokenize(source)
        .into_iter()
        .map(|tok| {
            let text = &source[tok.span.start as usize..tok.span.end as usize];
            format!("{:?} {:?} {}..{}", tok.kind, text, tok.span.start, tok.span.end)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Snapshot tests ───────────────────────────────────────────────────────

#[test]
fn test_patch_call() {
    insta::assert_snapshot!(render(r#"Patch(NewVar, Index(NewVar, 1), {Prop2: "haha"})"#), @r###"
Ident "Patch" 0..5
LParen "(" 5..6
Ident "NewVar" 6..12
Comma "," 12..13
Ident "Index" 14..19
LParen "(" 19..20
Ident "NewVar" 20..26
Comma "," 26..27
Number "1" 28..29
RParen ")" 29..30
Comma "," 30..31
LBrace "{" 32..33
Ident "Prop2" 33..38
Colon ":" 38..39
String "\"haha\"" 40..46
RBrace "}" 46..47
RParen ")" 47..48
Eof "" 48..48
"###);
}

#[test]
fn test_quoted_ident_number_and_keyword() {
    insta::assert_snapshot!(render("'Order Lines'.Qty 2.5e3 true"), @r###"
QuotedIdent "'Order Lines'" 0..13
Dot "." 13..14
Ident "Qty" 14..17
Number "2.5e3" 18..23
True "true" 24..28
Eof "" 28..28
"###);
}

// ── Error recovery ───────────────────────────────────────────────────────

#[test]
fn test_unterminated_string() {
    let (tokens, errors) = Lexer::tokenize_with_errors("{a: \"open");
    assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    assert!(tokens.iter().any(|t| t.kind == TokenKind::Error));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, LexErrorKind::UnterminatedString);
    assert_eq!(errors[0].span.start, 4);
}

#[test]
fn test_unexpected_character_keeps_lexing() {
    let (tokens, errors) = Lexer::tokenize_with_errors("a @ b");
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![TokenKind::Ident, TokenKind::Error, TokenKind::Ident, TokenKind::Eof]
    );
    assert_eq!(errors[0].kind, LexErrorKind::UnexpectedCharacter('@'));
}

#[test]
fn test_incomplete_exponent() {
    let (_, errors) = Lexer::tokenize_with_errors("1e+");
    assert_eq!(
        errors[0].kind,
        LexErrorKind::InvalidNumberLiteral("1e+".to_string())
    );
}

#[test]
fn test_escaped_quotes_stay_in_one_token() {
    let tokens = Lexer::tokenize(r#""a ""b"" c""#);
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(
        formula_lexer::unquote(r#""a ""b"" c""#, '"'),
        r#"a "b" c"#
    );
}

#[test]
fn test_quoted_ident_ending_on_escape_is_unterminated() {
    let (tokens, errors) = Lexer::tokenize_with_errors("First('it'')");
    assert_eq!(tokens[2].kind, TokenKind::Error);
    assert_eq!(tokens[2].span.start, 6);
    assert_eq!(tokens[2].span.end, 12);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, LexErrorKind::UnterminatedQuotedIdent);
}
