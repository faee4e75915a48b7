//! The heredoc/nowdoc engine: header recognition, the two-phase
//! scan-ahead, body scanning with end-marker detection, and indentation
//! stripping.
//!
//! Heredocs are measured in two phases. Phase one speculatively lexes the
//! body to find the closing label and record its indentation — necessary
//! because interpolated code inside the body can itself contain heredocs.
//! Phase two re-lexes the body for real, stripping the recorded
//! indentation from every line. Both phases run the same body scanner;
//! the scan-ahead flag only switches whether indentation is recorded or
//! stripped, which is what keeps the two passes byte-for-byte aligned.

use crate::lexer::Lexer;
use crate::lex_error::LexErrorKind;
use crate::span::Span;
use crate::state::{Condition, HeredocLabel};
use crate::token::{TokenKind, TokenValue};
use rill_lexer_core::{is_label_continuation, is_label_start};

const USING_SPACES: u8 = 1;
const USING_TABS: u8 = 2;

fn label_len(name: &[u8]) -> u32 {
    u32::try_from(name.len()).unwrap_or(u32::MAX)
}

impl<'a> Lexer<'a> {
    /// Try to lex a heredoc/nowdoc header at `start`:
    /// `<<<`, optional horizontal whitespace, an optionally quoted label,
    /// and a line terminator. Returns `false` without moving the cursor
    /// when the text is not a header (the caller falls back to the shift
    /// operators).
    pub(crate) fn try_lex_heredoc_header(&mut self, start: u32, bprefix: bool) -> bool {
        let mut probe = self.cursor;
        probe.advance_n(3); // <<<
        probe.eat_horizontal_whitespace();
        let quote = match probe.current() {
            q @ (b'\'' | b'"') => {
                probe.advance();
                Some(q)
            }
            _ => None,
        };
        if !is_label_start(probe.current()) {
            return false;
        }
        let label_start = probe.pos();
        probe.advance();
        probe.eat_while(is_label_continuation);
        let label_end = probe.pos();
        if let Some(q) = quote {
            if probe.current() != q {
                return false;
            }
            probe.advance();
        }
        let newline_len = match probe.current() {
            b'\r' if probe.peek() == b'\n' => 2,
            b'\r' | b'\n' => 1,
            _ => return false,
        };
        if probe.remaining() < newline_len {
            return false;
        }
        probe.advance_n(newline_len);

        let name = probe.slice(label_start, label_end).to_vec();
        self.cursor = probe;
        self.line_number += 1;
        if bprefix {
            self.flags.set_lexing_binary_string(true);
        }
        let is_heredoc = quote != Some(b'\'');
        self.condition = if is_heredoc { Condition::InHeredoc } else { Condition::InNowdoc };
        self.heredoc_stack.push(HeredocLabel::new(name.clone()));

        // First body line: measure indentation for the immediate-marker
        // fast path (empty heredoc).
        let body_start = self.cursor.pos();
        let mut spacing = 0u8;
        let mut indentation = 0u32;
        while !self.cursor.is_at_end() && matches!(self.cursor.current(), b' ' | b'\t') {
            spacing |= if self.cursor.current() == b'\t' { USING_TABS } else { USING_SPACES };
            self.cursor.advance();
            indentation += 1;
        }

        if self.cursor.is_at_end() {
            // The body runs straight into the end of the range.
            self.cursor.set_pos(body_start);
            self.form_token(TokenKind::StartHeredoc, start);
            return true;
        }

        if self.is_heredoc_end_marker(&name)
            && !is_label_continuation(self.cursor.byte_at(self.cursor.pos() + label_len(&name)))
        {
            if spacing == (USING_SPACES | USING_TABS) {
                self.notify_lexical_exception(
                    LexErrorKind::MixedHeredocIndentation,
                    Span::new(body_start, self.cursor.pos()),
                );
            }
            self.cursor.set_pos(body_start);
            if let Some(label) = self.heredoc_stack.last_mut() {
                label.indentation = indentation;
                label.indentation_uses_spaces = spacing == USING_SPACES;
            }
            self.condition = Condition::EndHeredoc;
            self.flags.set_reserve_heredoc_spaces(true);
            self.form_token(TokenKind::StartHeredoc, start);
            return true;
        }

        self.cursor.set_pos(body_start);
        if is_heredoc && !self.flags.is_heredoc_scan_ahead() {
            self.heredoc_scan_ahead();
        }
        self.flags.set_reserve_heredoc_spaces(true);
        self.form_token(TokenKind::StartHeredoc, start);
        true
    }

    /// Phase one: lex the body speculatively until the matching end
    /// marker (tracking nested heredocs), record the closing line's
    /// indentation, and restore the lexer as if nothing happened.
    fn heredoc_scan_ahead(&mut self) {
        let (measured, uses_spaces) = self.with_scan_ahead(|lx| {
            lx.flags.set_heredoc_scan_ahead(true);
            lx.flags.set_heredoc_indentation_uses_spaces(false);
            lx.heredoc_indentation = 0;
            let mut nesting: u32 = 1;
            let mut first = TokenKind::Unknown;
            while nesting > 0 {
                lx.lex_impl();
                if lx.flags.is_lex_exception_occurred() {
                    lx.clear_exception_flag();
                    break;
                }
                let kind = lx.next_token.kind();
                if first == TokenKind::Unknown {
                    first = kind;
                }
                match kind {
                    TokenKind::StartHeredoc => nesting += 1,
                    TokenKind::EndHeredoc => nesting -= 1,
                    TokenKind::EndOfFile => nesting = 0,
                    _ => {}
                }
            }
            // A body that opens with interpolation cannot be re-indented
            // by stripping: its first chunk starts mid-line. The message
            // and handler call outlive the frame; the flag does not, so
            // the body pass still runs the strip that reports per line.
            let measured = lx.heredoc_indentation;
            if measured > 0
                && matches!(
                    first,
                    TokenKind::Variable | TokenKind::DollarOpenCurlyBraces | TokenKind::CurlyOpen
                )
            {
                lx.notify_lexical_exception(
                    LexErrorKind::UnderIndentedHeredocBody { expected: measured },
                    Span::point(lx.cursor.pos()),
                );
            }
            (measured, lx.flags.is_heredoc_indentation_uses_spaces())
        });
        self.flags.set_increment_line_number(false);
        if let Some(label) = self.heredoc_stack.last_mut() {
            label.indentation = measured;
            label.indentation_uses_spaces = uses_spaces;
        }
    }

    /// One step inside a heredoc (`is_heredoc`) or nowdoc body.
    pub(crate) fn scan_heredoc_like(&mut self, is_heredoc: bool) -> bool {
        let start = self.cursor.pos();
        if self.cursor.is_at_end() {
            self.form_token(TokenKind::EndOfFile, start);
            return true;
        }
        if is_heredoc && self.scan_interp_anchor(start) {
            return true;
        }
        self.lex_heredoc_body(start, is_heredoc)
    }

    /// Phase two (and the scan-ahead's inner pass): consume body text
    /// until an interpolation anchor or the end marker at the start of a
    /// line.
    fn lex_heredoc_body(&mut self, start: u32, is_heredoc: bool) -> bool {
        let Some(top) = self.heredoc_stack.last() else {
            // The condition machine guarantees a label while a *doc
            // condition is active.
            debug_assert!(false, "heredoc body without a label");
            self.form_token(TokenKind::EndOfFile, start);
            return true;
        };
        let name = top.name.clone();
        let nlen = label_len(&name);
        let mut newline_len: u32 = 0;
        let mut end_indentation = 0u32;
        let mut end_spacing = 0u8;

        'scan: while !self.cursor.is_at_end() {
            let byte = self.cursor.current();
            self.cursor.advance();
            let mut at_newline = byte == b'\n';
            if byte == b'\r' {
                if self.cursor.current() == b'\n' {
                    self.cursor.advance();
                }
                at_newline = true;
            }
            if at_newline {
                let mut indentation = 0u32;
                let mut spacing = 0u8;
                while !self.cursor.is_at_end() && matches!(self.cursor.current(), b' ' | b'\t') {
                    spacing |= if self.cursor.current() == b' ' { USING_SPACES } else { USING_TABS };
                    self.cursor.advance();
                    indentation += 1;
                }
                if self.cursor.is_at_end() {
                    // Unterminated: hand back the partial body.
                    let end = self.cursor.pos();
                    self.handle_newlines(start, end);
                    self.form_token(TokenKind::EncapsedAndWhitespace, start);
                    let partial = self.cursor.slice(start, end).to_vec();
                    self.next_token.set_value(TokenValue::Str(partial.into()));
                    return true;
                }
                if self.is_heredoc_end_marker(&name) {
                    if is_label_continuation(self.cursor.byte_at(self.cursor.pos() + nlen)) {
                        // Label is a prefix of ordinary body text.
                        continue 'scan;
                    }
                    if spacing == (USING_SPACES | USING_TABS) {
                        self.notify_lexical_exception(
                            LexErrorKind::MixedHeredocIndentation,
                            Span::new(self.cursor.pos() - indentation, self.cursor.pos()),
                        );
                    }
                    let line_start = self.cursor.pos() - indentation;
                    newline_len = if line_start >= 2
                        && self.cursor.byte_at(line_start - 2) == b'\r'
                        && self.cursor.byte_at(line_start - 1) == b'\n'
                    {
                        2
                    } else {
                        1
                    };
                    // The newline before the marker is counted on the
                    // next lex call.
                    self.flags.set_increment_line_number(true);
                    if self.flags.is_heredoc_scan_ahead() {
                        self.heredoc_indentation = indentation;
                        self.flags.set_heredoc_indentation_uses_spaces(spacing == USING_SPACES);
                    } else {
                        self.cursor.retreat_n(indentation);
                    }
                    end_indentation = indentation;
                    end_spacing = spacing;
                    self.flags.set_reserve_heredoc_spaces(true);
                    self.condition = Condition::EndHeredoc;
                    break 'scan;
                }
                continue 'scan;
            }
            if is_heredoc {
                match byte {
                    b'$' => {
                        if is_label_start(self.cursor.current()) || self.cursor.current() == b'{' {
                            self.cursor.retreat_n(1);
                            break 'scan;
                        }
                    }
                    b'{' => {
                        if self.cursor.current() == b'$' {
                            self.cursor.retreat_n(1);
                            break 'scan;
                        }
                    }
                    b'\\' => {
                        // An escaped byte, except that line terminators
                        // stay visible to the end-marker scan.
                        if !self.cursor.is_at_end()
                            && self.cursor.current() != b'\n'
                            && self.cursor.current() != b'\r'
                        {
                            self.cursor.advance();
                        }
                    }
                    _ => {}
                }
            }
        }

        let end = self.cursor.pos();
        self.handle_newlines(start, end - newline_len.min(end - start));
        let raw = self.cursor.slice(start, end);

        let checked = !self.flags.is_heredoc_scan_ahead()
            && !self.flags.is_lex_exception_occurred()
            && (self.opts.parse_mode || self.opts.check_heredoc_indentation);
        let (indentation, uses_spaces) = if is_heredoc {
            self.heredoc_stack.last().map_or((0, false), |label| {
                (label.indentation, label.indentation_uses_spaces)
            })
        } else {
            // Nowdoc is single-pass: the closing line just measured is
            // authoritative.
            if let Some(label) = self.heredoc_stack.last_mut() {
                label.indentation = end_indentation;
            }
            (end_indentation, end_spacing == USING_SPACES)
        };

        if checked {
            let newline_at_start =
                start > 0 && matches!(self.cursor.byte_at(start - 1), b'\n' | b'\r');
            match strip_indentation(raw, indentation, uses_spaces, newline_at_start) {
                Ok(stripped) => {
                    if is_heredoc {
                        return self.finish_quoted(start, &stripped, 0, TokenKind::EncapsedAndWhitespace);
                    }
                    self.form_token(TokenKind::EncapsedAndWhitespace, start);
                    self.next_token.set_value(TokenValue::Str(stripped.into()));
                }
                Err(kind) => {
                    self.notify_lexical_exception(kind, Span::new(start, end));
                    self.form_error_token(start);
                }
            }
        } else {
            let value = raw.to_vec();
            self.form_token(TokenKind::EncapsedAndWhitespace, start);
            self.next_token.set_value(TokenValue::Str(value.into()));
        }
        true
    }

    /// The closing label line: emit the zero-width body of an empty
    /// heredoc first, then consume indentation plus label and return to
    /// script code.
    pub(crate) fn lex_heredoc_end(&mut self) -> bool {
        let start = self.text_start;
        if self.next_token.kind() == TokenKind::StartHeredoc {
            self.form_token(TokenKind::EncapsedAndWhitespace, start);
            self.next_token.set_value(TokenValue::Str(Box::default()));
            return true;
        }
        let Some(label) = self.heredoc_stack.pop() else {
            debug_assert!(false, "heredoc end without a label");
            self.form_token(TokenKind::EndOfFile, start);
            return true;
        };
        self.cursor.advance_n(label.indentation + label_len(&label.name));
        self.condition = Condition::InScripting;
        self.flags.set_lexing_binary_string(false);
        self.form_token(TokenKind::EndHeredoc, start);
        true
    }
}

/// Remove `indentation` characters of leading whitespace from every line
/// of `raw`, verifying the whitespace type. Empty lines are exempt; a
/// content line with less indentation than required is an error, as is a
/// whitespace character of the wrong kind.
fn strip_indentation(
    raw: &[u8],
    indentation: u32,
    uses_spaces: bool,
    newline_at_start: bool,
) -> Result<Vec<u8>, LexErrorKind> {
    if indentation == 0 {
        return Ok(raw.to_vec());
    }
    let expected = if uses_spaces { b' ' } else { b'\t' };
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0usize;
    let mut at_line_start = newline_at_start;
    while i < raw.len() {
        if at_line_start {
            let mut skipped = 0u32;
            while skipped < indentation && i < raw.len() {
                match raw[i] {
                    b'\n' | b'\r' => break,
                    b' ' | b'\t' => {
                        if raw[i] != expected {
                            return Err(LexErrorKind::MixedHeredocIndentation);
                        }
                        i += 1;
                        skipped += 1;
                    }
                    _ => {
                        return Err(LexErrorKind::UnderIndentedHeredocBody {
                            expected: indentation,
                        })
                    }
                }
            }
            at_line_start = false;
            continue;
        }
        let byte = raw[i];
        out.push(byte);
        i += 1;
        if byte == b'\n' {
            at_line_start = true;
        } else if byte == b'\r' {
            if raw.get(i) == Some(&b'\n') {
                out.push(b'\n');
                i += 1;
            }
            at_line_start = true;
        }
    }
    Ok(out)
}
