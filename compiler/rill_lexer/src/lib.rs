//! Trivia-preserving lexer for the Rill scripting language.
//!
//! Turns a source buffer into a stream of tokens enriched with *trivia*
//! (whitespace, comments, the byte-order mark, recovered garbage) so a
//! downstream parser can consume a stripped token stream while tooling
//! reconstructs the exact source byte-for-byte from the same tokens.
//!
//! # Architecture
//!
//! This crate is the stateful half of the two-layer lexer; the byte-level
//! substrate (sentinel-terminated buffers, cursor, code-point
//! classification) lives in `rill_lexer_core`.
//!
//! The scanning engine drives a stack of *conditions* — regular script
//! code, double-quoted/backquoted string bodies, heredoc and nowdoc
//! bodies, and the end-of-heredoc line — and produces one token per call.
//! Heredoc bodies are lexed twice: a speculative scan-ahead measures the
//! closing label's indentation, then the body re-lexes with that
//! indentation stripped.
//!
//! # Example
//!
//! ```
//! use rill_lexer::{tokenize, LexerOptions, SourceManager, TokenKind};
//!
//! let mut sm = SourceManager::new();
//! let buffer = sm.add_buffer(b"<?php $x = 1;");
//! let tokens = tokenize(&sm, buffer, LexerOptions::default());
//! let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind()).collect();
//! assert_eq!(
//!     kinds,
//!     [
//!         TokenKind::OpenTag,
//!         TokenKind::Variable,
//!         TokenKind::Equals,
//!         TokenKind::IntegerLiteral,
//!         TokenKind::Semicolon,
//!     ]
//! );
//! ```

mod confusables;
mod escape;
mod heredoc;
mod keywords;
mod lex_error;
mod lexer;
mod number;
mod scripting;
mod source_mgr;
mod span;
mod state;
mod strings;
mod token;
mod trivia;

#[cfg(test)]
mod tests;

pub use lex_error::{DiagnosticHandler, LexDiag, LexError, LexErrorKind, LexicalExceptionHandler};
pub use lexer::{
    get_indentation_for_line, get_loc_for_end_of_line, get_loc_for_end_of_token,
    get_loc_for_start_of_line, get_loc_for_start_of_token, get_token_at_location, tokenize,
    tokenize_all, CommentRetentionMode, Lexer, LexerOptions, TriviaRetentionMode,
};
pub use source_mgr::{BufferId, SourceManager};
pub use span::{SourceLoc, Span};
pub use state::{Condition, HeredocLabel, LexerFlags, LexerState};
pub use token::{Token, TokenKind, TokenValue};
pub use trivia::{ParsedTrivia, TriviaKind, TriviaPiece};
