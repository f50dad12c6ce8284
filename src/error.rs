// ═══════════════════════════════════════════════════════════
// Lumen errors: lexing, parsing and runtime failures
// ═══════════════════════════════════════════════════════════

use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use thiserror::Error;

use crate::lexer::{Span, TokenKind};
use crate::value::Value;

// ── Front-end errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl LexError {
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        LexError { message: message.into(), line, column }
    }

    pub fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
    /// Token kinds that would have been accepted at the failure point.
    pub expected: Vec<TokenKind>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        ParseError { message: message.into(), line: span.line, column: span.column, expected: Vec::new() }
    }

    pub fn expecting(mut self, expected: Vec<TokenKind>) -> Self {
        self.expected = expected;
        self
    }

    pub fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }
}

// ── Runtime error taxonomy ────────────────────────────────────────────────────

/// Category of a runtime error. Matched by name in typed `catch` clauses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Lex,
    Parse,
    Name,
    Type,
    Value,
    Index,
    Key,
    Attribute,
    ConstAssignment,
    ModuleNotFound,
    Import,
    DivisionByZero,
    Overflow,
    Recursion,
    Assertion,
    Io,
    Error,
    /// A user-chosen kind, from `error(msg, kind="...")`.
    Custom(Rc<str>),
}

impl ErrorKind {
    pub fn name(&self) -> &str {
        match self {
            ErrorKind::Lex => "LexError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::Name => "NameError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Value => "ValueError",
            ErrorKind::Index => "IndexError",
            ErrorKind::Key => "KeyError",
            ErrorKind::Attribute => "AttributeError",
            ErrorKind::ConstAssignment => "ConstAssignmentError",
            ErrorKind::ModuleNotFound => "ModuleNotFoundError",
            ErrorKind::Import => "ImportError",
            ErrorKind::DivisionByZero => "DivisionByZeroError",
            ErrorKind::Overflow => "OverflowError",
            ErrorKind::Recursion => "RecursionError",
            ErrorKind::Assertion => "AssertionError",
            ErrorKind::Io => "IOError",
            ErrorKind::Error => "Error",
            ErrorKind::Custom(name) => name,
        }
    }

    /// Inverse of [`ErrorKind::name`]; unknown names become `Custom`.
    pub fn from_name(name: &str) -> ErrorKind {
        match name {
            "LexError" => ErrorKind::Lex,
            "ParseError" => ErrorKind::Parse,
            "NameError" => ErrorKind::Name,
            "TypeError" => ErrorKind::Type,
            "ValueError" => ErrorKind::Value,
            "IndexError" => ErrorKind::Index,
            "KeyError" => ErrorKind::Key,
            "AttributeError" => ErrorKind::Attribute,
            "ConstAssignmentError" => ErrorKind::ConstAssignment,
            "ModuleNotFoundError" => ErrorKind::ModuleNotFound,
            "ImportError" => ErrorKind::Import,
            "DivisionByZeroError" => ErrorKind::DivisionByZero,
            "OverflowError" => ErrorKind::Overflow,
            "RecursionError" => ErrorKind::Recursion,
            "AssertionError" => ErrorKind::Assertion,
            "IOError" => ErrorKind::Io,
            "Error" => ErrorKind::Error,
            other => ErrorKind::Custom(Rc::from(other)),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
    /// Near-miss names offered as "did you mean" hints.
    pub suggestions: Vec<String>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RuntimeError { kind, message: message.into(), span: None, suggestions: Vec::new() }
    }

    pub fn name(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Name, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, message)
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Index, message)
    }

    pub fn key(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Key, message)
    }

    pub fn attribute(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Attribute, message)
    }

    pub fn import(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Import, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    /// Attach a location unless one is already recorded; the innermost site wins.
    pub fn at(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

// ── Control flow signals ──────────────────────────────────────────────────────

/// Non-local exits threaded through statement execution.
#[derive(Debug, Clone)]
pub enum ControlFlow {
    Return(Value),
    Break,
    Continue,
    Error(RuntimeError),
}

impl From<RuntimeError> for ControlFlow {
    fn from(e: RuntimeError) -> Self {
        ControlFlow::Error(e)
    }
}

// ── Top-level error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LumenError {
    #[error("LexError: {0}")]
    Lex(#[from] LexError),
    #[error("ParseError: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("IOError: cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LumenError {
    pub fn kind_name(&self) -> &str {
        match self {
            LumenError::Lex(_) => "LexError",
            LumenError::Parse(_) => "ParseError",
            LumenError::Runtime(e) => e.kind.name(),
            LumenError::Io { .. } => "IOError",
        }
    }

    pub fn message(&self) -> String {
        match self {
            LumenError::Lex(e) => e.message.clone(),
            LumenError::Parse(e) => e.message.clone(),
            LumenError::Runtime(e) => e.message.clone(),
            LumenError::Io { path, source } => format!("cannot read '{}': {}", path.display(), source),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            LumenError::Lex(e) => Some(e.span()),
            LumenError::Parse(e) => Some(e.span()),
            LumenError::Runtime(e) => e.span,
            LumenError::Io { .. } => None,
        }
    }

    pub fn suggestions(&self) -> &[String] {
        match self {
            LumenError::Runtime(e) => &e.suggestions,
            _ => &[],
        }
    }

    pub fn as_runtime(&self) -> Option<&RuntimeError> {
        match self {
            LumenError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}
