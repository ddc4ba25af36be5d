// Formula lexer -- tokenizer for the formula expression subset.

mod cursor;

use cursor::Cursor;
use formula_common::error::{LexError, LexErrorKind};
use formula_common::token::{keyword_from_str, Token, TokenKind};

/// The formula lexer. Converts source text into a stream of tokens.
///
/// Wraps a [`Cursor`] for character-level scanning and implements
/// `Iterator<Item = Token>`. Whitespace and comments are skipped. Problems
/// are reported as `Error` tokens in the stream plus a [`LexError`] in
/// [`Lexer::errors`], so lexing never stops early.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    /// Whether we have already emitted the `Eof` token.
    emitted_eof: bool,
    errors: Vec<LexError>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            emitted_eof: false,
            errors: Vec::new(),
        }
    }

    /// Convenience: tokenize the entire source into a `Vec<Token>`.
    ///
    /// The returned vector includes the final `Eof` token.
    pub fn tokenize(source: &str) -> Vec<Token> {
        Lexer::new(source).collect()
    }

    /// Tokenize the entire source, returning the tokens and any lexer errors.
    pub fn tokenize_with_errors(source: &str) -> (Vec<Token>, Vec<LexError>) {
        let mut lexer = Lexer::new(source);
        let tokens: Vec<Token> = lexer.by_ref().collect();
        (tokens, lexer.errors)
    }

    /// Errors collected so far.
    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    fn next_token(&mut self) -> Token {
        if let Some(err) = self.skip_trivia() {
            return err;
        }

        let start = self.cursor.pos();

        let Some(c) = self.cursor.peek() else {
            return Token::new(TokenKind::Eof, start, start);
        };

        match c {
            '(' => self.single_char_token(TokenKind::LParen, start),
            ')' => self.single_char_token(TokenKind::RParen, start),
            '[' => self.single_char_token(TokenKind::LBracket, start),
            ']' => self.single_char_token(TokenKind::RBracket, start),
            '{' => self.single_char_token(TokenKind::LBrace, start),
            '}' => self.single_char_token(TokenKind::RBrace, start),
            ',' => self.single_char_token(TokenKind::Comma, start),
            ':' => self.single_char_token(TokenKind::Colon, start),
            '.' => self.single_char_token(TokenKind::Dot, start),

            '0'..='9' => self.lex_number(start),
            '"' => self.lex_quoted(start, '"', TokenKind::String),
            '\'' => self.lex_quoted(start, '\'', TokenKind::QuotedIdent),

            c if is_ident_start(c) => self.lex_ident(start),

            _ => {
                self.cursor.advance();
                self.error(LexErrorKind::UnexpectedCharacter(c), start)
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    /// Skip whitespace, `// line` comments and `/* block */` comments.
    ///
    /// Returns an `Error` token if a block comment runs to end of input.
    fn skip_trivia(&mut self) -> Option<Token> {
        loop {
            self.cursor.eat_while(char::is_whitespace);
            if !self.cursor.at_comment() {
                return None;
            }
            if let Err(span) = self.cursor.eat_comment() {
                return Some(self.error(LexErrorKind::UnterminatedBlockComment, span.start));
            }
        }
    }

    fn single_char_token(&mut self, kind: TokenKind, start: u32) -> Token {
        self.cursor.advance();
        Token::new(kind, start, self.cursor.pos())
    }

    /// Record an error ending at the current position and return an `Error` token.
    fn error(&mut self, kind: LexErrorKind, start: u32) -> Token {
        let span = self.cursor.span_from(start);
        self.errors.push(LexError::new(kind, span));
        Token::new(TokenKind::Error, span.start, span.end)
    }

    /// `12`, `3.25`, `1e10`, `2.5E-3`.
    fn lex_number(&mut self, start: u32) -> Token {
        self.cursor.eat_digits();

        if self.cursor.peek() == Some('.')
            && self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
        {
            self.cursor.advance();
            self.cursor.eat_digits();
        }

        if matches!(self.cursor.peek(), Some('e' | 'E')) {
            self.cursor.advance();
            if !self.cursor.bump_if('+') {
                self.cursor.bump_if('-');
            }
            if !self.cursor.eat_digits() {
                let text = self.cursor.slice(self.cursor.span_from(start)).to_string();
                return self.error(LexErrorKind::InvalidNumberLiteral(text), start);
            }
        }

        Token::new(TokenKind::Number, start, self.cursor.pos())
    }

    /// Text literals (`"a ""b"""`) and quoted identifiers (`'Order Lines'`).
    ///
    /// The token span includes both delimiters; unescaping is left to the parser.
    fn lex_quoted(&mut self, start: u32, delim: char, kind: TokenKind) -> Token {
        let run = self.cursor.eat_quoted(delim);
        if run.terminated {
            return Token::new(kind, run.span.start, run.span.end);
        }
        let err = if kind == TokenKind::String {
            LexErrorKind::UnterminatedString
        } else {
            LexErrorKind::UnterminatedQuotedIdent
        };
        self.error(err, start)
    }

    fn lex_ident(&mut self, start: u32) -> Token {
        self.cursor.eat_while(is_ident_continue);
        let text = self.cursor.slice(self.cursor.span_from(start));
        let kind = keyword_from_str(text).unwrap_or(TokenKind::Ident);
        Token::new(kind, start, self.cursor.pos())
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.emitted_eof = true;
        }
        Some(token)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Strip the delimiters from a quoted token's text and collapse doubled
/// delimiters, e.g. `"say ""hi"""` -> `say "hi"`.
///
/// Text without a leading delimiter is returned unchanged.
pub fn unquote(text: &str, delim: char) -> String {
    let Some(inner) = text.strip_prefix(delim) else {
        return text.to_string();
    };
    let inner = inner.strip_suffix(delim).unwrap_or(inner);
    let doubled: String = [delim, delim].iter().collect();
    inner.replace(&doubled, &delim.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn unquote_collapses_doubled_delimiters() {
        assert_eq!(unquote(r#""say ""hi""""#, '"'), r#"say "hi""#);
        assert_eq!(unquote("'Order Lines'", '\''), "Order Lines");
        assert_eq!(unquote("'it''s'", '\''), "it's");
        assert_eq!(unquote("plain", '"'), "plain");
    }

    #[test]
    fn comments_are_trivia() {
        assert_eq!(
            kinds("First(T) // trailing\n/* block */ .a"),
            vec![
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        let (tokens, errors) = Lexer::tokenize_with_errors("1 /* never closed");
        assert_eq!(tokens[1].kind, TokenKind::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, LexErrorKind::UnterminatedBlockComment);
    }

    #[test]
    fn dot_after_number_without_digits_is_separate() {
        assert_eq!(
            kinds("1.a"),
            vec![TokenKind::Number, TokenKind::Dot, TokenKind::Ident, TokenKind::Eof]
        );
    }
}
