//! Scanners for the script-code conditions: `InScripting` and the
//! `LookingForProperty` / `LookingForVarname` / `VarOffset` intermediates.
//!
//! The main dispatch is a full-byte `match`: each arm consumes its token
//! and forms it, longest spelling first for the compound operators.
//! Scanners return `true` when a token was formed; `false` means the
//! condition was popped without consuming anything and the driver should
//! re-dispatch under the outer condition.

use crate::lexer::{Lexer, NullCharacterKind};
use crate::lex_error::LexDiag;
use crate::state::Condition;
use crate::token::{TokenKind, TokenValue};
use crate::trivia::TriviaKind;
use rill_lexer_core::{is_label_continuation, is_label_start};

impl<'a> Lexer<'a> {
    pub(crate) fn scan_in_scripting(&mut self) -> bool {
        loop {
            let start = self.cursor.pos();
            if self.cursor.is_at_end() {
                self.form_token(TokenKind::EndOfFile, start);
                return true;
            }
            match self.cursor.current() {
                0 => {
                    if self.null_character_kind(start) == NullCharacterKind::CodeCompletion {
                        self.cursor.advance();
                        self.form_token(TokenKind::CodeCompletion, start);
                        return true;
                    }
                    // An embedded null the trivia pass did not consume.
                    self.cursor.advance();
                    self.diagnose(start, &LexDiag::EmbeddedNull);
                    let text = self.cursor.slice_from(start).to_vec();
                    self.leading_trivia.push_text(TriviaKind::GarbageText, text);
                }
                b'\'' => return self.lex_single_quote_string(start, 0),
                b'"' => return self.lex_double_quote_string(start),
                b'`' => {
                    self.cursor.advance();
                    self.condition = Condition::InBackquote;
                    self.form_token(TokenKind::Backquote, start);
                    return true;
                }
                b'$' => return self.dollar(start),
                b'0'..=b'9' => return self.lex_number(start),
                byte if is_label_start(byte) => return self.identifier_or_keyword(start),
                b'<' => return self.smaller(start),
                b'>' => return self.greater(start),
                b'=' => return self.equal(start),
                b'!' => return self.bang(start),
                b'+' => return self.plus(start),
                b'-' => return self.minus(start),
                b'*' => return self.star(start),
                b'/' => return self.slash_or_comment(start),
                b'%' => return self.percent(start),
                b'&' => return self.ampersand(start),
                b'|' => return self.pipe(start),
                b'^' => return self.caret(start),
                b'~' => return self.single(TokenKind::Tilde, start),
                b'.' => return self.dot(start),
                b'?' => return self.question(start),
                b':' => return self.colon(start),
                b'(' => return self.left_paren_or_cast(start),
                b')' => return self.single(TokenKind::RightParen, start),
                b'[' => return self.single(TokenKind::LeftBracket, start),
                b']' => return self.single(TokenKind::RightBracket, start),
                b',' => return self.single(TokenKind::Comma, start),
                b';' => return self.single(TokenKind::Semicolon, start),
                b'@' => return self.single(TokenKind::At, start),
                b'\\' => return self.single(TokenKind::Backslash, start),
                b'{' => {
                    self.cursor.advance();
                    self.push_condition(Condition::InScripting);
                    self.form_token(TokenKind::LeftBrace, start);
                    return true;
                }
                b'}' => {
                    self.cursor.advance();
                    if !self.condition_stack.is_empty() {
                        self.pop_condition();
                    }
                    self.form_token(TokenKind::RightBrace, start);
                    return true;
                }
                _ => {
                    // Control characters and other junk: recover, keeping
                    // the bytes either as a token or as garbage trivia.
                    if self.lex_unknown(start, true) {
                        self.form_token(TokenKind::Unknown, start);
                        return true;
                    }
                    let text = self.cursor.slice_from(start).to_vec();
                    self.leading_trivia.push_text(TriviaKind::GarbageText, text);
                }
            }
        }
    }

    /// Single-byte token.
    fn single(&mut self, kind: TokenKind, start: u32) -> bool {
        self.cursor.advance();
        self.form_token(kind, start);
        true
    }

    /// Two bytes already validated by the caller.
    fn pair(&mut self, kind: TokenKind, start: u32) -> bool {
        self.cursor.advance_n(2);
        self.form_token(kind, start);
        true
    }

    fn dollar(&mut self, start: u32) -> bool {
        if is_label_start(self.cursor.peek()) {
            self.cursor.advance();
            self.eat_label();
            self.form_variable_token(start);
            true
        } else {
            self.single(TokenKind::Dollar, start)
        }
    }

    fn identifier_or_keyword(&mut self, start: u32) -> bool {
        let span = self.eat_label();
        let text = self.cursor.slice(span.start, span.end);

        // A lone `b` (either case) directly before a string opener is the
        // binary prefix.
        if matches!(text, b"b" | b"B") {
            match self.cursor.current() {
                b'\'' => {
                    self.flags.set_lexing_binary_string(true);
                    return self.lex_single_quote_string(start, 1);
                }
                b'"' => {
                    self.flags.set_lexing_binary_string(true);
                    return self.lex_double_quote_string(start);
                }
                b'<' if self.cursor.peek() == b'<' && self.cursor.peek2() == b'<' => {
                    if self.try_lex_heredoc_header(start, true) {
                        return true;
                    }
                }
                _ => {}
            }
        }

        match self.keyword_kind(span) {
            Some(kind) => self.form_token(kind, start),
            None => self.form_identifier_token(start),
        }
        true
    }

    fn smaller(&mut self, start: u32) -> bool {
        if self.cursor.peek() == b'<' && self.cursor.peek2() == b'<' && self.try_lex_heredoc_header(start, false) {
            return true;
        }
        if self.cursor.peek() == b'?' && self.is_open_tag_at(start) {
            self.cursor.advance_n(5);
            self.form_token(TokenKind::OpenTag, start);
            return true;
        }
        self.cursor.advance();
        match self.cursor.current() {
            b'<' => {
                self.cursor.advance();
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    self.form_token(TokenKind::ShiftLeftEqual, start);
                } else {
                    self.form_token(TokenKind::ShiftLeft, start);
                }
            }
            b'=' => {
                self.cursor.advance();
                if self.cursor.current() == b'>' {
                    self.cursor.advance();
                    self.form_token(TokenKind::Spaceship, start);
                } else {
                    self.form_token(TokenKind::IsSmallerOrEqual, start);
                }
            }
            b'>' => {
                self.cursor.advance();
                self.form_token(TokenKind::IsNotEqual, start);
            }
            _ => self.form_token(TokenKind::Smaller, start),
        }
        true
    }

    /// `<?php` at `start`, with a whitespace or end-of-range boundary
    /// after the tag word.
    fn is_open_tag_at(&self, start: u32) -> bool {
        if start + 5 > self.cursor.limit() {
            return false;
        }
        let tag = [
            self.cursor.byte_at(start + 2),
            self.cursor.byte_at(start + 3),
            self.cursor.byte_at(start + 4),
        ];
        if tag != [b'p', b'h', b'p'] {
            return false;
        }
        let after = self.cursor.byte_at(start + 5);
        start + 5 >= self.cursor.limit() || matches!(after, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C)
    }

    fn greater(&mut self, start: u32) -> bool {
        self.cursor.advance();
        match self.cursor.current() {
            b'>' => {
                self.cursor.advance();
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    self.form_token(TokenKind::ShiftRightEqual, start);
                } else {
                    self.form_token(TokenKind::ShiftRight, start);
                }
            }
            b'=' => {
                self.cursor.advance();
                self.form_token(TokenKind::IsGreaterOrEqual, start);
            }
            _ => self.form_token(TokenKind::Greater, start),
        }
        true
    }

    fn equal(&mut self, start: u32) -> bool {
        self.cursor.advance();
        match self.cursor.current() {
            b'=' => {
                self.cursor.advance();
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    self.form_token(TokenKind::IsIdentical, start);
                } else {
                    self.form_token(TokenKind::IsEqual, start);
                }
            }
            b'>' => {
                self.cursor.advance();
                self.form_token(TokenKind::DoubleArrow, start);
            }
            _ => self.form_token(TokenKind::Equals, start),
        }
        true
    }

    fn bang(&mut self, start: u32) -> bool {
        self.cursor.advance();
        if self.cursor.current() == b'=' {
            self.cursor.advance();
            if self.cursor.current() == b'=' {
                self.cursor.advance();
                self.form_token(TokenKind::IsNotIdentical, start);
            } else {
                self.form_token(TokenKind::IsNotEqual, start);
            }
        } else {
            self.form_token(TokenKind::Exclamation, start);
        }
        true
    }

    fn plus(&mut self, start: u32) -> bool {
        match self.cursor.peek() {
            b'+' => self.pair(TokenKind::Inc, start),
            b'=' => self.pair(TokenKind::PlusEqual, start),
            _ => self.single(TokenKind::Plus, start),
        }
    }

    fn minus(&mut self, start: u32) -> bool {
        match self.cursor.peek() {
            b'>' => {
                self.cursor.advance_n(2);
                self.push_condition(Condition::LookingForProperty);
                self.form_token(TokenKind::ObjectOperator, start);
                true
            }
            b'-' => self.pair(TokenKind::Dec, start),
            b'=' => self.pair(TokenKind::MinusEqual, start),
            _ => self.single(TokenKind::Minus, start),
        }
    }

    fn star(&mut self, start: u32) -> bool {
        self.cursor.advance();
        match self.cursor.current() {
            b'*' => {
                self.cursor.advance();
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    self.form_token(TokenKind::PowEqual, start);
                } else {
                    self.form_token(TokenKind::Pow, start);
                }
            }
            b'=' => {
                self.cursor.advance();
                self.form_token(TokenKind::MulEqual, start);
            }
            _ => self.form_token(TokenKind::Mul, start),
        }
        true
    }

    fn slash_or_comment(&mut self, start: u32) -> bool {
        if self.is_keeping_comments() {
            if self.cursor.peek() == b'/' {
                let is_doc = self.cursor.peek2() == b'/';
                self.cursor.advance_n(2);
                self.skip_to_end_of_line(false);
                self.form_token(
                    if is_doc { TokenKind::DocComment } else { TokenKind::Comment },
                    start,
                );
                return true;
            }
            if self.cursor.peek() == b'*' {
                let is_doc = self.cursor.peek2() == b'*';
                self.cursor.advance();
                self.skip_block_comment();
                self.form_token(
                    if is_doc { TokenKind::DocComment } else { TokenKind::Comment },
                    start,
                );
                return true;
            }
        }
        match self.cursor.peek() {
            b'=' => self.pair(TokenKind::DivEqual, start),
            _ => self.single(TokenKind::Div, start),
        }
    }

    fn percent(&mut self, start: u32) -> bool {
        match self.cursor.peek() {
            b'=' => self.pair(TokenKind::ModEqual, start),
            _ => self.single(TokenKind::Mod, start),
        }
    }

    fn ampersand(&mut self, start: u32) -> bool {
        match self.cursor.peek() {
            b'&' => self.pair(TokenKind::BooleanAnd, start),
            b'=' => self.pair(TokenKind::AndEqual, start),
            _ => self.single(TokenKind::Ampersand, start),
        }
    }

    fn pipe(&mut self, start: u32) -> bool {
        match self.cursor.peek() {
            b'|' => self.pair(TokenKind::BooleanOr, start),
            b'=' => self.pair(TokenKind::OrEqual, start),
            _ => self.single(TokenKind::Pipe, start),
        }
    }

    fn caret(&mut self, start: u32) -> bool {
        match self.cursor.peek() {
            b'=' => self.pair(TokenKind::XorEqual, start),
            _ => self.single(TokenKind::Caret, start),
        }
    }

    fn dot(&mut self, start: u32) -> bool {
        if self.cursor.peek().is_ascii_digit() {
            return self.lex_number(start);
        }
        self.cursor.advance();
        if self.cursor.current() == b'=' {
            self.cursor.advance();
            self.form_token(TokenKind::ConcatEqual, start);
        } else if self.cursor.current() == b'.' && self.cursor.peek() == b'.' {
            self.cursor.advance_n(2);
            self.form_token(TokenKind::Ellipsis, start);
        } else {
            self.form_token(TokenKind::Dot, start);
        }
        true
    }

    fn question(&mut self, start: u32) -> bool {
        self.cursor.advance();
        match self.cursor.current() {
            b'?' => {
                self.cursor.advance();
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    self.form_token(TokenKind::CoalesceEqual, start);
                } else {
                    self.form_token(TokenKind::Coalesce, start);
                }
            }
            b'>' => {
                self.cursor.advance();
                self.form_token(TokenKind::CloseTag, start);
            }
            _ => self.form_token(TokenKind::Question, start),
        }
        true
    }

    fn colon(&mut self, start: u32) -> bool {
        match self.cursor.peek() {
            b':' => self.pair(TokenKind::DoubleColon, start),
            _ => self.single(TokenKind::Colon, start),
        }
    }

    /// `(` or a cast operator: `(` then optional horizontal whitespace, a
    /// cast word, optional horizontal whitespace, `)`.
    fn left_paren_or_cast(&mut self, start: u32) -> bool {
        let mut probe = self.cursor;
        probe.advance();
        probe.eat_horizontal_whitespace();
        let word_start = probe.pos();
        probe.eat_while(|b| b.is_ascii_alphabetic());
        let word_end = probe.pos();
        if word_end > word_start {
            if let Some(kind) = crate::keywords::cast_lookup(probe.slice(word_start, word_end)) {
                probe.eat_horizontal_whitespace();
                if probe.current() == b')' {
                    probe.advance();
                    self.cursor = probe;
                    self.form_token(kind, start);
                    return true;
                }
            }
        }
        self.single(TokenKind::LeftParen, start)
    }

    // ─── LookingForProperty ────────────────────────────────────────────

    pub(crate) fn scan_looking_for_property(&mut self) -> bool {
        let start = self.cursor.pos();
        if self.cursor.is_at_end() {
            self.form_token(TokenKind::EndOfFile, start);
            return true;
        }
        if self.cursor.current() == b'-' && self.cursor.peek() == b'>' {
            self.cursor.advance_n(2);
            self.form_token(TokenKind::ObjectOperator, start);
            return true;
        }
        if is_label_start(self.cursor.current()) {
            self.eat_label();
            // Pop first so trailing trivia is judged under the outer
            // condition (no trivia inside string bodies).
            self.pop_condition();
            self.form_identifier_token(start);
            return true;
        }
        self.pop_condition();
        false
    }

    // ─── LookingForVarname ─────────────────────────────────────────────

    pub(crate) fn scan_looking_for_varname(&mut self) -> bool {
        let start = self.cursor.pos();
        if is_label_start(self.cursor.current()) {
            let mut probe = self.cursor;
            probe.advance();
            probe.eat_while(is_label_continuation);
            if matches!(probe.current(), b'}' | b'[') {
                self.cursor = probe;
                self.pop_condition();
                self.push_condition(Condition::InScripting);
                self.form_string_variable_token(start);
                return true;
            }
        }
        // Not a simple variable name: re-lex as an expression.
        self.pop_condition();
        self.push_condition(Condition::InScripting);
        false
    }

    // ─── VarOffset ─────────────────────────────────────────────────────

    pub(crate) fn scan_var_offset(&mut self) -> bool {
        let start = self.cursor.pos();
        if self.cursor.is_at_end() {
            self.form_token(TokenKind::EndOfFile, start);
            return true;
        }
        match self.cursor.current() {
            b'[' => self.single(TokenKind::LeftBracket, start),
            b']' => {
                self.cursor.advance();
                self.pop_condition();
                self.form_token(TokenKind::RightBracket, start);
                true
            }
            b'0'..=b'9' => {
                self.lex_num_string(start);
                true
            }
            b'$' if is_label_start(self.cursor.peek()) => {
                self.cursor.advance();
                self.eat_label();
                self.form_variable_token(start);
                true
            }
            b'-' => self.single(TokenKind::Minus, start),
            byte if is_label_start(byte) => {
                self.eat_label();
                self.form_identifier_token(start);
                true
            }
            _ => {
                // Anything else ends the offset context.
                self.pop_condition();
                false
            }
        }
    }

    /// Offset numbers are kept as strings: decimal, hex, or binary runs
    /// lex as `NumString` with the raw text as value.
    fn lex_num_string(&mut self, start: u32) {
        if self.cursor.current() == b'0'
            && matches!(self.cursor.peek(), b'x' | b'X')
            && self.cursor.peek2().is_ascii_hexdigit()
        {
            self.cursor.advance_n(2);
            self.cursor.eat_while(|b| b.is_ascii_hexdigit());
        } else if self.cursor.current() == b'0'
            && matches!(self.cursor.peek(), b'b' | b'B')
            && matches!(self.cursor.peek2(), b'0' | b'1')
        {
            self.cursor.advance_n(2);
            self.cursor.eat_while(|b| matches!(b, b'0' | b'1'));
        } else {
            self.cursor.eat_while(|b| b.is_ascii_digit());
        }
        self.form_token(TokenKind::NumString, start);
        let span = self.next_token.span();
        let value = self.cursor.slice(span.start, span.end).to_vec();
        self.next_token.set_value(TokenValue::Str(value.into()));
    }
}
