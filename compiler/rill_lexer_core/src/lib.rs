//! Byte-level scanning substrate for the Rill lexer.
//!
//! This crate is the dependency-light half of Rill's two-layer lexer:
//!
//! - **`rill_lexer_core`** (this crate): sentinel-terminated source buffers,
//!   a copyable byte [`Cursor`] with an artificial end, and code-point
//!   classification. No tokens, no conditions, no diagnostics.
//! - **`rill_lexer`**: the stateful lexer proper — trivia, tokens, scan
//!   conditions, heredocs, diagnostics.
//!
//! The split keeps the byte machinery reusable by external tools (syntax
//! highlighters, formatters) without pulling in the lexer's token model.
//!
//! # Sentinel termination
//!
//! [`SourceBuffer`] guarantees a `0x00` byte after the source content plus
//! zero-filled padding up to a cache-line boundary, so the scanner can probe
//! `peek()`/`peek2()` near the end of input without bounds checks. Interior
//! null bytes are legal in the buffer (they are diagnosed by the lexer, not
//! here); EOF is a position check, not a byte check.
//!
//! ```
//! use rill_lexer_core::SourceBuffer;
//!
//! let buf = SourceBuffer::new(b"echo 42;");
//! let cursor = buf.cursor();
//! assert_eq!(buf.len(), 8);
//! assert_eq!(cursor.current(), b'e');
//! ```

mod classify;
mod cursor;
mod source_buffer;

pub use classify::{
    advance_if_identifier_continuation, advance_if_identifier_start, advance_if_operator_continuation,
    advance_if_operator_start, is_horizontal_whitespace, is_identifier_continuation_code_point,
    is_identifier_start_code_point, is_label_continuation, is_label_start, is_operator_byte,
    validate_utf8_and_advance, INVALID_CODE_POINT,
};
pub use cursor::Cursor;
pub use source_buffer::SourceBuffer;
