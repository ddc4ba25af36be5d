//! Recursive descent parser for formulas.
//!
//! The parser consumes the token stream from `formula-lexer` and builds an
//! [`Expr`] tree directly. It follows a first-error-only strategy: once an
//! error is recorded, parsing unwinds and no tree is produced, so callers
//! never see a partially-built expression.

use formula_common::span::Span;
use formula_common::token::{Token, TokenKind};
use formula_lexer::unquote;

use crate::ast::{Expr, ExprKind, Name, RecordField};
use crate::error::ParseError;

/// Unwinds parsing after the first error. The error itself is stored on the
/// parser so the public result can carry it.
pub(crate) struct Abort;

type PResult<T> = Result<T, Abort>;

pub(crate) struct Parser<'src> {
    /// All tokens from the lexer (including Eof).
    tokens: Vec<Token>,
    /// Current position in the token stream.
    pos: usize,
    /// Original source text (for extracting token text via spans).
    source: &'src str,
    /// Collected parse errors.
    errors: Vec<ParseError>,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(tokens: Vec<Token>, source: &'src str) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            errors: Vec::new(),
        }
    }

    pub(crate) fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    /// Parse a complete formula: one expression followed by end of input.
    pub(crate) fn parse_formula(&mut self) -> PResult<Expr> {
        let expr = self.parse_expr()?;
        if self.current() != TokenKind::Eof {
            let tok = self.current_token().clone();
            return self.fail(ParseError::new(
                format!("unexpected {} after end of expression", describe(tok.kind)),
                tok.span,
            ));
        }
        Ok(expr)
    }

    // ── Token access ─────────────────────────────────────────────────────

    fn current_token(&self) -> &Token {
        // The lexer always ends the stream with Eof, and we never advance past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current(&self) -> TokenKind {
        self.current_token().kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.current_token().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn text(&self, span: Span) -> &'src str {
        &self.source[span.range()]
    }

    fn fail<T>(&mut self, error: ParseError) -> PResult<T> {
        self.errors.push(error);
        Err(Abort)
    }

    /// Expect a closing delimiter, pointing back at the opener on failure.
    fn expect_close(&mut self, kind: TokenKind, what: &str, open: Span) -> PResult<Token> {
        if self.at(kind) {
            return Ok(self.advance());
        }
        let tok = self.current_token().clone();
        self.fail(ParseError::with_related(
            format!(
                "expected {} to close {}, found {}",
                describe(kind),
                what,
                describe(tok.kind)
            ),
            tok.span,
            "opened here",
            open,
        ))
    }

    fn expect_name(&mut self, context: &str) -> PResult<Name> {
        let tok = self.current_token().clone();
        if !tok.kind.is_ident() {
            return self.fail(ParseError::new(
                format!("expected {}, found {}", context, describe(tok.kind)),
                tok.span,
            ));
        }
        self.advance();
        Ok(self.name_from(&tok))
    }

    fn name_from(&self, tok: &Token) -> Name {
        let raw = self.text(tok.span);
        let text = if tok.kind == TokenKind::QuotedIdent {
            unquote(raw, '\'')
        } else {
            raw.to_string()
        };
        Name::new(text, tok.span)
    }

    // ── Expressions ──────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        while self.eat(TokenKind::Dot) {
            let field = self.expect_name("a field name after `.`")?;
            let span = expr.span.merge(field.span);
            expr = Expr::new(
                ExprKind::Field {
                    base: Box::new(expr),
                    field,
                },
                span,
            );
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.current_token().clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                let text = self.text(tok.span);
                match text.parse::<f64>() {
                    Ok(n) => Ok(Expr::new(ExprKind::Number(n), tok.span)),
                    Err(_) => self.fail(ParseError::new(
                        format!("invalid number literal: {}", text),
                        tok.span,
                    )),
                }
            }
            TokenKind::String => {
                self.advance();
                let text = unquote(self.text(tok.span), '"');
                Ok(Expr::new(ExprKind::Text(text), tok.span))
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(Expr::new(
                    ExprKind::Boolean(tok.kind == TokenKind::True),
                    tok.span,
                ))
            }
            TokenKind::Ident | TokenKind::QuotedIdent => {
                self.advance();
                let name = self.name_from(&tok);
                if self.at(TokenKind::LParen) {
                    self.parse_call(name)
                } else {
                    let span = name.span;
                    Ok(Expr::new(ExprKind::Ident(name), span))
                }
            }
            TokenKind::LBrace => self.parse_record(),
            TokenKind::LBracket => self.parse_table(),
            TokenKind::LParen => {
                let open = self.advance();
                let mut inner = self.parse_expr()?;
                let close = self.expect_close(TokenKind::RParen, "parenthesized expression", open.span)?;
                inner.span = open.span.merge(close.span);
                Ok(inner)
            }
            _ => self.fail(ParseError::new(
                format!("expected expression, found {}", describe(tok.kind)),
                tok.span,
            )),
        }
    }

    /// `Name(arg, ...)` -- the name has already been consumed.
    fn parse_call(&mut self, func: Name) -> PResult<Expr> {
        let open = self.advance();
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.expect_close(TokenKind::RParen, "argument list", open.span)?;
        let span = func.span.merge(close.span);
        Ok(Expr::new(ExprKind::Call { func, args }, span))
    }

    fn parse_record(&mut self) -> PResult<Expr> {
        let open = self.advance();
        let mut fields: Vec<RecordField> = Vec::new();
        if !self.at(TokenKind::RBrace) {
            loop {
                let name = self.expect_name("a field name")?;
                if let Some(prev) = fields.iter().find(|f| f.name.text == name.text) {
                    let prev_span = prev.name.span;
                    return self.fail(ParseError::with_related(
                        format!("duplicate field `{}` in record literal", name.text),
                        name.span,
                        "first defined here",
                        prev_span,
                    ));
                }
                if !self.eat(TokenKind::Colon) {
                    let tok = self.current_token().clone();
                    return self.fail(ParseError::new(
                        format!("expected `:` after field name, found {}", describe(tok.kind)),
                        tok.span,
                    ));
                }
                let value = self.parse_expr()?;
                fields.push(RecordField { name, value });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.expect_close(TokenKind::RBrace, "record literal", open.span)?;
        Ok(Expr::new(ExprKind::Record(fields), open.span.merge(close.span)))
    }

    fn parse_table(&mut self) -> PResult<Expr> {
        let open = self.advance();
        let mut items = Vec::new();
        if !self.at(TokenKind::RBracket) {
            loop {
                items.push(self.parse_expr()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.expect_close(TokenKind::RBracket, "table literal", open.span)?;
        Ok(Expr::new(ExprKind::Table(items), open.span.merge(close.span)))
    }
}

/// Human-readable token description for error messages.
fn describe(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::True | TokenKind::False => "boolean literal",
        TokenKind::LParen => "`(`",
        TokenKind::RParen => "`)`",
        TokenKind::LBracket => "`[`",
        TokenKind::RBracket => "`]`",
        TokenKind::LBrace => "`{`",
        TokenKind::RBrace => "`}`",
        TokenKind::Comma => "`,`",
        TokenKind::Dot => "`.`",
        TokenKind::Colon => "`:`",
        TokenKind::Number => "number",
        TokenKind::String => "text literal",
        TokenKind::Ident | TokenKind::QuotedIdent => "identifier",
        TokenKind::Eof => "end of input",
        TokenKind::Error => "invalid token",
    }
}
