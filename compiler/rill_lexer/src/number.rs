//! Numeric literal scanners: decimal/octal, hex, binary, and double, with
//! strict 64-bit overflow detection and demotion to double.
//!
//! Decimal runs shorter than 19 digits cannot overflow and take the fast
//! path. Longer runs (and wide hex/binary literals) parse with checked
//! arithmetic; on overflow the literal demotes to a double via a
//! per-base fold — and when the previous token was a unary minus and the
//! digits spell exactly the magnitude of `i64::MIN`, the token carries
//! the overflow-correction flag so the parser can fold the sign in.

use crate::lexer::Lexer;
use crate::lex_error::LexErrorKind;
use crate::span::Span;
use crate::token::{TokenKind, TokenValue};

/// Decimal digit count below which a signed 64-bit parse cannot overflow.
const MAX_LENGTH_OF_INT64: usize = 19;

/// Decimal magnitude of `i64::MIN`.
const I64_MIN_DECIMAL_MAGNITUDE: &[u8] = b"9223372036854775808";
/// Octal magnitude of `i64::MIN`, as it survives leading-zero skipping.
const I64_MIN_OCTAL_MAGNITUDE: &[u8] = b"01000000000000000000000";
/// Hex magnitude of `i64::MIN`, leading zeros skipped.
const I64_MIN_HEX_MAGNITUDE: &[u8] = b"8000000000000000";

enum IntParse {
    /// Parsed `consumed` digits without overflow; stops early at the
    /// first digit invalid for the base.
    Value { value: i64, consumed: usize },
    /// The accumulated value left the signed 64-bit range.
    Overflow,
}

/// Strict left-to-right signed parse, stopping at the first digit not
/// valid for `base`.
fn parse_i64(digits: &[u8], base: u32) -> IntParse {
    let mut value: i64 = 0;
    for (i, &b) in digits.iter().enumerate() {
        let Some(d) = (b as char).to_digit(base) else {
            return IntParse::Value { value, consumed: i };
        };
        match value
            .checked_mul(i64::from(base))
            .and_then(|v| v.checked_add(i64::from(d)))
        {
            Some(v) => value = v,
            None => return IntParse::Overflow,
        }
    }
    IntParse::Value {
        value,
        consumed: digits.len(),
    }
}

/// Per-base floating accumulation for overflowed literals. Returns the
/// value and how many digits were valid for the base.
fn fold_f64(digits: &[u8], base: u32) -> (f64, usize) {
    let mut value = 0f64;
    for (i, &b) in digits.iter().enumerate() {
        let Some(d) = (b as char).to_digit(base) else {
            return (value, i);
        };
        value = value * f64::from(base) + f64::from(d);
    }
    (value, digits.len())
}

impl<'a> Lexer<'a> {
    /// Dispatch on a numeric literal: hex/binary prefix, or a digit run
    /// that a `.` or exponent promotes to a double. Also entered from the
    /// `.` dispatch for `.5`-style doubles.
    pub(crate) fn lex_number(&mut self, start: u32) -> bool {
        let first = self.cursor.current();
        if first == b'0'
            && matches!(self.cursor.peek(), b'x' | b'X')
            && self.cursor.peek2().is_ascii_hexdigit()
        {
            return self.lex_hex_number(start);
        }
        if first == b'0'
            && matches!(self.cursor.peek(), b'b' | b'B')
            && matches!(self.cursor.peek2(), b'0' | b'1')
        {
            return self.lex_binary_number(start);
        }

        let mut is_double = first == b'.';
        if is_double {
            self.cursor.advance();
            self.cursor.eat_while(|b| b.is_ascii_digit());
        } else {
            self.cursor.eat_while(|b| b.is_ascii_digit());
            if self.cursor.current() == b'.' {
                // Longest match: `1.` is a double even with nothing after
                // the dot.
                is_double = true;
                self.cursor.advance();
                self.cursor.eat_while(|b| b.is_ascii_digit());
            }
        }
        if matches!(self.cursor.current(), b'e' | b'E') {
            let sign = self.cursor.peek();
            if sign.is_ascii_digit()
                || (matches!(sign, b'+' | b'-') && self.cursor.peek2().is_ascii_digit())
            {
                is_double = true;
                self.cursor.advance();
                if matches!(self.cursor.current(), b'+' | b'-') {
                    self.cursor.advance();
                }
                self.cursor.eat_while(|b| b.is_ascii_digit());
            }
        }

        if is_double {
            self.lex_double_number(start)
        } else {
            self.lex_long_number(start)
        }
    }

    /// A plain digit run: decimal, or octal when it starts with `0`.
    fn lex_long_number(&mut self, start: u32) -> bool {
        let end = self.cursor.pos();
        let digits = self.cursor.slice(start, end);
        let len = digits.len();

        if len < MAX_LENGTH_OF_INT64 {
            // Cannot overflow; only invalid octal digits can go wrong.
            let base = if digits[0] == b'0' { 8 } else { 10 };
            return match parse_i64(digits, base) {
                IntParse::Value { value, consumed } if consumed == len => {
                    self.form_token(TokenKind::IntegerLiteral, start);
                    self.next_token.set_value(TokenValue::Int(value));
                    true
                }
                _ => self.invalid_numeric_literal(start, end),
            };
        }

        // Long runs: strict parse, demoting to double on overflow.
        let (num, base) = if digits[0] == b'0' {
            let mut i = 0;
            while i + 1 < len && digits[i + 1] == b'0' {
                i += 1;
            }
            (&digits[i..], 8)
        } else {
            (digits, 10)
        };

        match parse_i64(num, base) {
            IntParse::Value { value, consumed } if consumed == num.len() => {
                self.form_token(TokenKind::IntegerLiteral, start);
                self.next_token.set_value(TokenValue::Int(value));
            }
            IntParse::Value { .. } => return self.invalid_numeric_literal(start, end),
            IntParse::Overflow => {
                let needs_correction = self.previous_is_minus()
                    && if base == 8 {
                        num == I64_MIN_OCTAL_MAGNITUDE
                    } else {
                        digits == I64_MIN_DECIMAL_MAGNITUDE
                    };
                let (value, consumed) = if base == 8 {
                    fold_f64(num, 8)
                } else {
                    // All-decimal digits: full-precision conversion.
                    let text = std::str::from_utf8(num).unwrap_or("");
                    (text.parse::<f64>().unwrap_or(f64::INFINITY), num.len())
                };
                if consumed != num.len() {
                    // Octal digits went bad somewhere past the overflow.
                    self.notify_lexical_exception(
                        LexErrorKind::InvalidNumericLiteral,
                        Span::new(start, end),
                    );
                    if self.opts.parse_mode {
                        self.form_error_token(start);
                        return true;
                    }
                }
                self.form_token(TokenKind::DoubleLiteral, start);
                self.next_token.set_value(TokenValue::Double(value));
                self.next_token.set_needs_overflow_correction(needs_correction);
            }
        }
        true
    }

    /// `0x…`: signed 64-bit unless more than 16 significant digits (or 16
    /// with a top digit past `7`), in which case the value demotes to a
    /// double via a base-16 fold.
    fn lex_hex_number(&mut self, start: u32) -> bool {
        self.cursor.advance_n(2);
        self.cursor.eat_while(|b| b.is_ascii_hexdigit());
        let end = self.cursor.pos();
        let digits = &self.cursor.slice(start, end)[2..];
        let mut i = 0;
        while i < digits.len() && digits[i] == b'0' {
            i += 1;
        }
        let hex = &digits[i..];
        let len = hex.len();

        if len < 16 || (len == 16 && hex[0] <= b'7') {
            let value = match parse_i64(hex, 16) {
                IntParse::Value { value, .. } => value,
                // Excluded by the width check above.
                IntParse::Overflow => 0,
            };
            self.form_token(TokenKind::IntegerLiteral, start);
            self.next_token.set_value(TokenValue::Int(value));
        } else {
            let needs_correction = self.previous_is_minus() && hex == I64_MIN_HEX_MAGNITUDE;
            let (value, _) = fold_f64(hex, 16);
            self.form_token(TokenKind::DoubleLiteral, start);
            self.next_token.set_value(TokenValue::Double(value));
            self.next_token.set_needs_overflow_correction(needs_correction);
        }
        true
    }

    /// `0b…`: signed 64-bit below 64 significant bits, double at or above.
    fn lex_binary_number(&mut self, start: u32) -> bool {
        self.cursor.advance_n(2);
        self.cursor.eat_while(|b| matches!(b, b'0' | b'1'));
        let end = self.cursor.pos();
        let digits = &self.cursor.slice(start, end)[2..];
        let mut i = 0;
        while i < digits.len() && digits[i] == b'0' {
            i += 1;
        }
        let bits = &digits[i..];

        if bits.len() < 64 {
            let value = match parse_i64(bits, 2) {
                IntParse::Value { value, .. } => value,
                // At most 63 significant bits here.
                IntParse::Overflow => 0,
            };
            self.form_token(TokenKind::IntegerLiteral, start);
            self.next_token.set_value(TokenValue::Int(value));
        } else {
            let (value, _) = fold_f64(bits, 2);
            self.form_token(TokenKind::DoubleLiteral, start);
            self.next_token.set_value(TokenValue::Double(value));
        }
        true
    }

    /// A complete double spelling (digits with `.` and/or exponent),
    /// already consumed.
    pub(crate) fn lex_double_number(&mut self, start: u32) -> bool {
        let end = self.cursor.pos();
        let text = self.cursor.slice_str(start, end);
        match text.parse::<f64>() {
            Ok(value) => {
                self.form_token(TokenKind::DoubleLiteral, start);
                self.next_token.set_value(TokenValue::Double(value));
                true
            }
            Err(_) => self.invalid_numeric_literal(start, end),
        }
    }

    fn invalid_numeric_literal(&mut self, start: u32, end: u32) -> bool {
        self.notify_lexical_exception(LexErrorKind::InvalidNumericLiteral, Span::new(start, end));
        if self.opts.parse_mode {
            self.form_error_token(start);
        } else {
            self.form_token(TokenKind::IntegerLiteral, start);
            self.next_token.set_invalid_lex_value(true);
        }
        true
    }

    fn previous_is_minus(&self) -> bool {
        self.next_token.kind() == TokenKind::Minus
    }
}
