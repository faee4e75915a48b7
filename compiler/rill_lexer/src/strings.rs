//! String literal scanners: single-quoted, double-quoted, backquoted, and
//! the shared interpolated-body machinery.
//!
//! A double-quoted (or backquoted) literal is scanned once from its
//! opening quote. If no interpolation anchor appears, the whole literal
//! lexes as one `StringLiteral` with its escapes expanded. When an anchor
//! is found the scan rewinds: the opening quote becomes its own token,
//! the condition machine enters the string, and subsequent calls yield
//! body chunks (`EncapsedAndWhitespace`), variables, and interpolation
//! openers until the closing quote token returns to script code.

use crate::escape::convert_double_quote_escapes;
use crate::escape::convert_single_quote_escapes;
use crate::lexer::Lexer;
use crate::lex_error::LexDiag;
use crate::span::Span;
use crate::state::Condition;
use crate::token::{TokenKind, TokenValue};
use rill_lexer_core::is_label_start;

impl<'a> Lexer<'a> {
    /// `'…'` with only `\\` and `\'` escapes. `bprefix` is 1 when a `b`
    /// binary prefix was consumed.
    pub(crate) fn lex_single_quote_string(&mut self, start: u32, bprefix: u32) -> bool {
        self.cursor.advance(); // opening quote
        loop {
            if self.cursor.is_at_end() {
                // Unterminated: recovery token carrying the partial body.
                let end = self.cursor.pos();
                self.handle_newlines(start, end);
                self.flags.set_lexing_binary_string(false);
                self.form_token(TokenKind::EncapsedAndWhitespace, start);
                let partial = self.cursor.slice(start + bprefix + 1, end).to_vec();
                self.next_token.set_value(TokenValue::Str(partial.into()));
                return true;
            }
            let byte = self.cursor.current();
            self.cursor.advance();
            match byte {
                b'\'' => break,
                b'\\' => {
                    if !self.cursor.is_at_end() {
                        self.cursor.advance();
                    }
                }
                _ => {}
            }
        }
        let end = self.cursor.pos();
        self.handle_newlines(start, end);
        self.flags.set_lexing_binary_string(false);
        let value = convert_single_quote_escapes(self.cursor.slice(start + bprefix + 1, end - 1));
        self.form_token(TokenKind::StringLiteral, start);
        self.next_token.set_value(TokenValue::Str(value.into()));
        true
    }

    /// `"…"` from script code, `start` at the opening quote or its `b`
    /// prefix. Complete anchor-free literals lex in one token; an
    /// interpolation anchor rewinds to just the opening quote (prefix
    /// included) and enters `InDoubleQuotes`.
    pub(crate) fn lex_double_quote_string(&mut self, start: u32) -> bool {
        self.cursor.advance(); // opening quote
        let body_start = self.cursor.pos();
        loop {
            match self.cursor.skip_to_interp_delim(b'"') {
                0 => break, // unterminated
                b'"' => {
                    self.cursor.advance();
                    let end = self.cursor.pos();
                    self.handle_newlines(start, end);
                    self.flags.set_lexing_binary_string(false);
                    let body = self.cursor.slice(body_start, end - 1);
                    return self.finish_quoted(start, body, b'"', TokenKind::StringLiteral);
                }
                b'\\' => {
                    self.cursor.advance();
                    if !self.cursor.is_at_end() {
                        self.cursor.advance();
                    }
                }
                b'$' => {
                    if is_label_start(self.cursor.peek()) || self.cursor.peek() == b'{' {
                        self.cursor.set_pos(body_start);
                        self.condition = Condition::InDoubleQuotes;
                        self.form_token(TokenKind::DoubleQuote, start);
                        return true;
                    }
                    self.cursor.advance();
                }
                b'{' => {
                    if self.cursor.peek() == b'$' {
                        self.cursor.set_pos(body_start);
                        self.condition = Condition::InDoubleQuotes;
                        self.form_token(TokenKind::DoubleQuote, start);
                        return true;
                    }
                    self.cursor.advance();
                }
                _ => self.cursor.advance(), // newline inside the literal
            }
        }
        // Unterminated: recovery token with the raw partial body.
        let end = self.cursor.pos();
        self.handle_newlines(start, end);
        self.flags.set_lexing_binary_string(false);
        self.form_token(TokenKind::EncapsedAndWhitespace, start);
        let partial = self.cursor.slice(body_start, end).to_vec();
        self.next_token.set_value(TokenValue::Str(partial.into()));
        true
    }

    /// One step inside an interpolated string: the closing quote, an
    /// anchor, or a body chunk.
    pub(crate) fn scan_interpolated(&mut self, quote: u8, quote_kind: TokenKind) -> bool {
        let start = self.cursor.pos();
        if self.cursor.is_at_end() {
            self.form_token(TokenKind::EndOfFile, start);
            return true;
        }
        if self.cursor.current() == quote {
            self.cursor.advance();
            self.condition = Condition::InScripting;
            self.flags.set_lexing_binary_string(false);
            self.form_token(quote_kind, start);
            return true;
        }
        if self.scan_interp_anchor(start) {
            return true;
        }
        self.scan_interp_chunk(start, quote)
    }

    /// Recognize `$name` (with optional `[` offset or `->` property
    /// lookahead), `${`, or `{$` at the cursor. Shared by the
    /// double-quote, backquote, and heredoc conditions.
    pub(crate) fn scan_interp_anchor(&mut self, start: u32) -> bool {
        match self.cursor.current() {
            b'$' if is_label_start(self.cursor.peek()) => {
                self.cursor.advance();
                self.eat_label();
                if self.cursor.current() == b'[' {
                    self.push_condition(Condition::VarOffset);
                } else if self.cursor.current() == b'-'
                    && self.cursor.peek() == b'>'
                    && is_label_start(self.cursor.peek2())
                {
                    self.push_condition(Condition::LookingForProperty);
                }
                self.form_variable_token(start);
                true
            }
            b'$' if self.cursor.peek() == b'{' => {
                self.cursor.advance_n(2);
                self.push_condition(Condition::LookingForVarname);
                self.form_token(TokenKind::DollarOpenCurlyBraces, start);
                true
            }
            b'{' if self.cursor.peek() == b'$' => {
                self.cursor.advance();
                self.push_condition(Condition::InScripting);
                self.form_token(TokenKind::CurlyOpen, start);
                true
            }
            _ => false,
        }
    }

    /// A run of plain body text up to the next anchor, the closing quote,
    /// or the end of the range.
    fn scan_interp_chunk(&mut self, start: u32, quote: u8) -> bool {
        loop {
            match self.cursor.skip_to_interp_delim(quote) {
                0 => break,
                b'\\' => {
                    self.cursor.advance();
                    if !self.cursor.is_at_end() {
                        self.cursor.advance();
                    }
                }
                b'$' => {
                    if is_label_start(self.cursor.peek()) || self.cursor.peek() == b'{' {
                        break;
                    }
                    self.cursor.advance();
                }
                b'{' => {
                    if self.cursor.peek() == b'$' {
                        break;
                    }
                    self.cursor.advance();
                }
                byte if byte == quote => break,
                _ => self.cursor.advance(), // newline
            }
        }
        let end = self.cursor.pos();
        debug_assert!(end > start, "empty interpolated chunk");
        self.handle_newlines(start, end);
        let body = self.cursor.slice(start, end);
        self.finish_quoted(start, body, quote, TokenKind::EncapsedAndWhitespace)
    }

    /// Expand escapes over `body` and form the token, converting a failed
    /// expansion to an `Error` token in parse mode or an invalid-value
    /// flag otherwise.
    pub(crate) fn finish_quoted(
        &mut self,
        start: u32,
        body: &[u8],
        quote: u8,
        kind: TokenKind,
    ) -> bool {
        match convert_double_quote_escapes(body, quote) {
            Ok(converted) => {
                if converted.octal_overflow {
                    self.diagnose(start, &LexDiag::OctalEscapeOverflow);
                }
                self.form_token(kind, start);
                self.next_token.set_value(TokenValue::Str(converted.bytes.into()));
            }
            Err(error_kind) => {
                let span = Span::new(start, self.cursor.pos());
                self.notify_lexical_exception(error_kind, span);
                if self.opts.parse_mode {
                    self.form_error_token(start);
                } else {
                    self.form_token(kind, start);
                    self.next_token.set_invalid_lex_value(true);
                }
            }
        }
        true
    }
}
