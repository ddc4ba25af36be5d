use formula_common::span::Span;

/// Outcome of scanning a quoted run such as `"text"` or `'Order Lines'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotedRun {
    /// Covers both delimiters when terminated, otherwise runs to end of input.
    pub span: Span,
    pub terminated: bool,
}

/// Character cursor over formula source text.
///
/// Positions are byte offsets into the source. Besides the single-character
/// primitives it knows the formula trivia and literal shapes: line and block
/// comments, quoted runs with doubled-delimiter escapes, and digit runs.
pub struct Cursor<'src> {
    source: &'src str,
    pos: u32,
    chars: std::str::Chars<'src>,
}

impl<'src> Cursor<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            chars: source.chars(),
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    /// The character `n` places ahead; `peek_nth(0)` is [`Cursor::peek`].
    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.chars.clone().nth(n)
    }

    pub fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8() as u32;
        Some(c)
    }

    /// Consume `expected` if it is next.
    pub fn bump_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Span from `start` to the current position.
    pub fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.pos)
    }

    pub fn eat_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&predicate) {
            self.advance();
        }
    }

    /// Consume ASCII digits, returning whether there was at least one.
    pub fn eat_digits(&mut self) -> bool {
        let start = self.pos;
        self.eat_while(|c| c.is_ascii_digit());
        self.pos > start
    }

    /// Whether a `//` or `/*` comment starts here.
    pub fn at_comment(&self) -> bool {
        self.peek() == Some('/') && matches!(self.peek_nth(1), Some('/' | '*'))
    }

    /// Consume one comment starting at the cursor. The trailing newline of a
    /// line comment is left for the whitespace skipper.
    ///
    /// Returns the span of a block comment that reaches end of input.
    pub fn eat_comment(&mut self) -> Result<(), Span> {
        let start = self.pos;
        self.advance();
        if self.bump_if('/') {
            self.eat_while(|c| c != '\n');
            return Ok(());
        }
        self.advance();
        while let Some(c) = self.advance() {
            if c == '*' && self.bump_if('/') {
                return Ok(());
            }
        }
        Err(self.span_from(start))
    }

    /// Consume a quoted run opened by the delimiter at the cursor. A doubled
    /// delimiter inside the run is an escaped delimiter, not the close.
    pub fn eat_quoted(&mut self, delim: char) -> QuotedRun {
        let start = self.pos;
        self.advance();
        while let Some(c) = self.advance() {
            if c == delim && !self.bump_if(delim) {
                return QuotedRun {
                    span: self.span_from(start),
                    terminated: true,
                };
            }
        }
        QuotedRun {
            span: self.span_from(start),
            terminated: false,
        }
    }

    pub fn slice(&self, span: Span) -> &'src str {
        &self.source[span.start as usize..span.end as usize]
    }
}
