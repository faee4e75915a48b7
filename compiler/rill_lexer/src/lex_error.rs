//! Lexical errors and recoverable diagnostics.
//!
//! Two severities flow out of the lexer:
//!
//! - [`LexError`] — a *lexical exception*: the construct has no valid
//!   lexing (bad numeric literal, broken heredoc indentation, malformed
//!   code-point escape). Scanner helpers return these as values; the
//!   boundary converts them to `Error` tokens in parse mode, or records
//!   them on the lexer (`is_lex_exception_occurred` /
//!   `current_exception_message`) and keeps going otherwise. An optional
//!   exception handler callback observes every one.
//! - [`LexDiag`] — a *diagnostic*: something worth reporting that does not
//!   stop a token from forming (embedded nulls, malformed UTF-8,
//!   confusable characters). Delivered fire-and-forget to the nullable
//!   diagnostic handler.

use crate::span::{SourceLoc, Span};
use std::fmt;

/// A lexical exception with its source span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LexError {
    /// Where the error occurred.
    pub span: Span,
    /// What went wrong.
    pub kind: LexErrorKind,
}

impl LexError {
    /// Create an error over `span`.
    pub fn new(span: Span, kind: LexErrorKind) -> Self {
        Self { span, kind }
    }

    /// The numeric code passed to the exception handler.
    pub fn code(&self) -> u32 {
        self.kind.code()
    }
}

/// What kind of lexical exception occurred.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexErrorKind {
    /// A numeric literal with digits invalid for its base (e.g. `019`).
    InvalidNumericLiteral,
    /// Tabs and spaces mixed in heredoc/nowdoc closing indentation.
    MixedHeredocIndentation,
    /// A heredoc body line indented less than the closing label.
    UnderIndentedHeredocBody {
        /// The indentation the closing label requires.
        expected: u32,
    },
    /// `\u{…}` escape without braces, with non-hex payload, or unclosed.
    InvalidCodePointEscape,
    /// `\u{…}` escape above U+10FFFF or encoding a surrogate.
    OverflowingCodePointEscape,
}

impl LexErrorKind {
    fn code(&self) -> u32 {
        match self {
            Self::InvalidNumericLiteral => 1,
            Self::MixedHeredocIndentation => 2,
            Self::UnderIndentedHeredocBody { .. } => 3,
            Self::InvalidCodePointEscape => 4,
            Self::OverflowingCodePointEscape => 5,
        }
    }
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNumericLiteral => f.write_str("Invalid numeric literal"),
            Self::MixedHeredocIndentation => {
                f.write_str("Invalid indentation - tabs and spaces cannot be mixed")
            }
            Self::UnderIndentedHeredocBody { expected } => write!(
                f,
                "Invalid body indentation level (expecting an indentation level of at least {expected})"
            ),
            Self::InvalidCodePointEscape => f.write_str("Invalid UTF-8 codepoint escape sequence"),
            Self::OverflowingCodePointEscape => {
                f.write_str("Invalid UTF-8 codepoint escape sequence: Codepoint too large")
            }
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

/// A recoverable diagnostic: `(diagnostic id, arguments)` as delivered to
/// the diagnostic handler together with a [`SourceLoc`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexDiag {
    /// A NUL byte inside the buffer content.
    EmbeddedNull,
    /// A malformed UTF-8 sequence, skipped.
    InvalidUtf8,
    /// A code point that cannot start an identifier, where one would.
    InvalidIdentifierStart,
    /// U+00A0, treated as a plain space.
    NonBreakingSpace,
    /// A character with no meaning in the language.
    InvalidCharacter {
        /// The offending code point.
        code_point: u32,
    },
    /// A Unicode character that resembles an ASCII one.
    ConfusableCharacter {
        /// The character found in source.
        found: char,
        /// The ASCII character it resembles.
        suggestion: char,
    },
    /// A `/*` comment with no closing `*/`.
    UnterminatedBlockComment,
    /// An octal escape above `\377`; the value is truncated.
    OctalEscapeOverflow,
}

impl LexDiag {
    /// Stable diagnostic id.
    pub fn id(&self) -> u32 {
        match self {
            Self::EmbeddedNull => 100,
            Self::InvalidUtf8 => 101,
            Self::InvalidIdentifierStart => 102,
            Self::NonBreakingSpace => 103,
            Self::InvalidCharacter { .. } => 104,
            Self::ConfusableCharacter { .. } => 105,
            Self::UnterminatedBlockComment => 106,
            Self::OctalEscapeOverflow => 107,
        }
    }
}

impl fmt::Display for LexDiag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmbeddedNull => f.write_str("nul character embedded in middle of file"),
            Self::InvalidUtf8 => f.write_str("invalid UTF-8 found in source file"),
            Self::InvalidIdentifierStart => {
                f.write_str("an identifier cannot begin with this character")
            }
            Self::NonBreakingSpace => f.write_str("non-breaking space (U+00A0) used instead of space"),
            Self::InvalidCharacter { code_point } => {
                write!(f, "invalid character in source file (U+{code_point:04X})")
            }
            Self::ConfusableCharacter { found, suggestion } => write!(
                f,
                "unicode character '{found}' looks similar to '{suggestion}'; did you mean to use '{suggestion}'?"
            ),
            Self::UnterminatedBlockComment => f.write_str("unterminated '/*' comment"),
            Self::OctalEscapeOverflow => {
                f.write_str("octal escape sequence overflow: value is greater than \\377")
            }
        }
    }
}

/// Nullable diagnostic sink: receives each [`LexDiag`] with its location.
pub type DiagnosticHandler<'a> = Box<dyn FnMut(SourceLoc, &LexDiag) + 'a>;

/// Optional callback invoked on every lexical exception with the rendered
/// message and its code.
pub type LexicalExceptionHandler<'a> = Box<dyn FnMut(&str, u32) + 'a>;
