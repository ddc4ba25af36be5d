use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// A lexer error with location information.
///
/// Errors are collected during lexing rather than aborting immediately, so a
/// formula with several problems reports all of them at once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

impl LexError {
    /// Create a new lexer error.
    pub fn new(kind: LexErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The specific kind of lexer error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LexErrorKind {
    /// An unexpected character was encountered.
    UnexpectedCharacter(char),
    /// A text literal was not closed before end of input.
    UnterminatedString,
    /// A quoted identifier was not closed before end of input.
    UnterminatedQuotedIdent,
    /// A block comment (`/* ... */`) was not closed before end of input.
    UnterminatedBlockComment,
    /// A number literal could not be parsed.
    InvalidNumberLiteral(String),
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedCharacter(c) => write!(f, "unexpected character: {c:?}"),
            Self::UnterminatedString => write!(f, "unterminated text literal"),
            Self::UnterminatedQuotedIdent => write!(f, "unterminated quoted identifier"),
            Self::UnterminatedBlockComment => write!(f, "unterminated block comment"),
            Self::InvalidNumberLiteral(s) => write!(f, "invalid number literal: {s}"),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for LexError {}

/// The kind of a runtime expression error.
///
/// Discriminants are the engine's stable error codes; hosts persist and
/// compare them, so existing values must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    None = 0,
    Sync = 1,
    MissingRequired = 2,
    CreatePermission = 3,
    EditPermission = 4,
    DeletePermission = 5,
    Conflict = 6,
    NotFound = 7,
    ConstraintViolated = 8,
    GeneratedValue = 9,
    ReadOnlyValue = 10,
    Validation = 11,
    Unknown = 12,
    Div0 = 13,
    BadLanguageCode = 14,
    BadRegex = 15,
    InvalidFunctionUsage = 16,
    FileNotFound = 17,
    AnalysisError = 18,
    ReadPermission = 19,
    NotSupported = 20,
    InsufficientMemory = 21,
    QuotaExceeded = 22,
    Network = 23,
    Numeric = 24,
    InvalidArgument = 25,
    Internal = 26,
    NotApplicable = 27,
    Timeout = 28,
    Custom = 1000,
}

impl ErrorKind {
    /// The numeric error code of this kind.
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Debug output is exactly the variant name.
        write!(f, "{:?}", self)
    }
}

/// How severe an expression error is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Warning,
    Moderate,
    Severe,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorSeverity::Warning => "warning",
            ErrorSeverity::Moderate => "moderate",
            ErrorSeverity::Severe => "severe",
            ErrorSeverity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}
