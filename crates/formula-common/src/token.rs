use serde::Serialize;

use crate::span::Span;

/// A token produced by the formula lexer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    /// Create a new token from a kind and byte offsets.
    pub fn new(kind: TokenKind, start: u32, end: u32) -> Self {
        Self {
            kind,
            span: Span::new(start, end),
        }
    }
}

/// Every kind of token in the formula subset.
///
/// Comments and whitespace are trivia and never become tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    // ── Keywords ───────────────────────────────────────────────────────
    True,
    False,

    // ── Delimiters ─────────────────────────────────────────────────────
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,

    // ── Punctuation ────────────────────────────────────────────────────
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `:`
    Colon,

    // ── Literals ───────────────────────────────────────────────────────
    /// Numeric literal, e.g. `1`, `3.14`, `2e10`.
    Number,
    /// Double-quoted text literal. `""` inside the quotes is an escaped quote.
    String,

    // ── Identifiers ────────────────────────────────────────────────────
    /// Plain identifier, e.g. `NewVar`, `Prop_1`.
    Ident,
    /// Single-quoted identifier, e.g. `'Order Lines'`.
    QuotedIdent,

    // ── Special ────────────────────────────────────────────────────────
    /// End of input.
    Eof,
    /// Invalid/unexpected input. Used for error recovery.
    Error,
}

impl TokenKind {
    /// Whether this token can name a variable, field or function.
    pub fn is_ident(self) -> bool {
        matches!(self, TokenKind::Ident | TokenKind::QuotedIdent)
    }
}

/// Look up a keyword from its string representation.
///
/// Keywords are case-sensitive: `true` is a literal, `True` is an identifier.
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    match s {
        "true" => Some(TokenKind::True),
        "false" => Some(TokenKind::False),
        _ => None,
    }
}
