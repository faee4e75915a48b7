//! The lexer: driver loop, trivia accumulation, token formation, state
//! save/restore, and the public entry points.
//!
//! The lexer always holds one fully-formed token ahead: construction
//! primes the first token, [`Lexer::peek_next_token`] is free, and
//! [`Lexer::lex_one`] returns the primed token and forms the next. Every
//! `lex_impl` run starts by snapshotting scan state, so
//! [`Lexer::save_state`] / [`Lexer::restore_state`] can rewind to the
//! token being peeked and re-lex it exactly.

use crate::keywords;
use crate::lex_error::{DiagnosticHandler, LexDiag, LexError, LexErrorKind, LexicalExceptionHandler};
use crate::source_mgr::{BufferId, SourceManager};
use crate::span::{SourceLoc, Span};
use crate::state::{Condition, HeredocLabel, LexerFlags, LexerState};
use crate::token::{Token, TokenKind, TokenValue};
use crate::trivia::{ParsedTrivia, TriviaKind};
use rill_lexer_core::{
    advance_if_identifier_continuation, advance_if_identifier_start, advance_if_operator_continuation,
    advance_if_operator_start, is_horizontal_whitespace, is_label_start, validate_utf8_and_advance,
    Cursor, SourceBuffer, INVALID_CODE_POINT,
};

/// What happens to comments during lexing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CommentRetentionMode {
    /// Comments are consumed and discarded.
    #[default]
    Strip,
    /// Comments fold into the next token's leading trivia and the token
    /// records its comment range.
    AttachToNext,
    /// Comments come back as synthetic `Comment`/`DocComment` tokens.
    ReturnAsTokens,
}

/// Whether tokens carry their leading and trailing trivia.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TriviaRetentionMode {
    /// Only the at-start-of-line flag is produced.
    #[default]
    WithoutTrivia,
    /// Tokens own their leading and trailing trivia lists.
    WithTrivia,
}

/// Lexer configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct LexerOptions {
    /// Comment handling; see [`CommentRetentionMode`].
    pub comment_retention: CommentRetentionMode,
    /// Trivia handling; see [`TriviaRetentionMode`].
    pub trivia_retention: TriviaRetentionMode,
    /// Run the two-phase heredoc algorithm's indentation stripping even
    /// outside parse mode.
    pub check_heredoc_indentation: bool,
    /// Byte offset of an in-place `\0` that acts as a code-completion
    /// anchor.
    pub code_completion_offset: Option<u32>,
    /// Parse mode: lexical exceptions become `Error` tokens instead of
    /// flagged literals.
    pub parse_mode: bool,
}

impl LexerOptions {
    /// Convenience alias for comment retention as tokens.
    pub fn keep_comments(mut self) -> Self {
        self.comment_retention = CommentRetentionMode::ReturnAsTokens;
        self
    }

    /// Enable trivia retention.
    pub fn with_trivia(mut self) -> Self {
        self.trivia_retention = TriviaRetentionMode::WithTrivia;
        self
    }
}

/// Why a NUL byte appeared under the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NullCharacterKind {
    /// The sentinel at (or past) the end of the scanned range.
    BufferEnd,
    /// A NUL inside the content.
    Embedded,
    /// The code-completion anchor.
    CodeCompletion,
}

/// Snapshot taken around a heredoc scan-ahead so every exit path restores
/// the lexer exactly.
struct ScanAheadFrame {
    state: LexerState,
    pending: LexerState,
    leading: ParsedTrivia,
    at_start_of_line: bool,
    diags_suppressed: bool,
}

/// The Rill lexer.
///
/// Borrows its buffer from a [`SourceManager`] for the lifetime of the
/// instance; owns its cursor, condition and heredoc stacks, and
/// accumulated trivia. Multiple lexers may scan the same buffer
/// independently.
pub struct Lexer<'a> {
    pub(crate) opts: LexerOptions,
    source_mgr: &'a SourceManager,
    buffer_id: BufferId,
    pub(crate) cursor: Cursor<'a>,
    /// Offset just past the UTF-8 BOM, if any.
    pub(crate) content_start: u32,
    /// Start of the token text being scanned.
    pub(crate) text_start: u32,
    pub(crate) condition: Condition,
    pub(crate) condition_stack: Vec<Condition>,
    pub(crate) heredoc_stack: Vec<HeredocLabel>,
    /// Scratch: indentation measured by the heredoc scan-ahead pass.
    pub(crate) heredoc_indentation: u32,
    pub(crate) flags: LexerFlags,
    pub(crate) line_number: u32,
    pub(crate) next_token: Token,
    pub(crate) leading_trivia: ParsedTrivia,
    trailing_trivia: ParsedTrivia,
    /// Scan state at the start of `next_token`, for save/restore.
    pending_state: LexerState,
    current_exception_msg: Option<String>,
    diag_handler: Option<DiagnosticHandler<'a>>,
    exception_handler: Option<LexicalExceptionHandler<'a>>,
    diags_suppressed: bool,
}

impl<'a> Lexer<'a> {
    /// Create a lexer that scans the whole buffer.
    pub fn new(source_mgr: &'a SourceManager, buffer_id: BufferId, opts: LexerOptions) -> Self {
        let len = source_mgr.buffer(buffer_id).len();
        Self::with_range(source_mgr, buffer_id, opts, 0, len)
    }

    /// Create a lexer over the subrange `[offset, end_offset)`; reaching
    /// `end_offset` produces the `EndOfFile` token.
    pub fn with_range(
        source_mgr: &'a SourceManager,
        buffer_id: BufferId,
        opts: LexerOptions,
        offset: u32,
        end_offset: u32,
    ) -> Self {
        let buffer = source_mgr.buffer(buffer_id);
        let mut cursor = buffer.cursor_at(0, end_offset);
        cursor.set_pos(offset);
        let mut lexer = Self {
            opts,
            source_mgr,
            buffer_id,
            cursor,
            content_start: buffer.bom_len(),
            text_start: offset,
            condition: Condition::InScripting,
            condition_stack: Vec::new(),
            heredoc_stack: Vec::new(),
            heredoc_indentation: 0,
            flags: LexerFlags::default(),
            line_number: 1,
            next_token: Token::default(),
            leading_trivia: ParsedTrivia::new(),
            trailing_trivia: ParsedTrivia::new(),
            pending_state: LexerState::default(),
            current_exception_msg: None,
            diag_handler: None,
            exception_handler: None,
            diags_suppressed: false,
        };
        lexer.lex_impl();
        lexer
    }

    /// Derive a lexer over a subrange of this lexer's buffer, inheriting
    /// its options and handlers' absence.
    pub fn sub_lexer(&self, offset: u32, end_offset: u32) -> Lexer<'a> {
        Lexer::with_range(self.source_mgr, self.buffer_id, self.opts, offset, end_offset)
    }

    /// Install a diagnostic handler.
    ///
    /// Construction primes the first token, so diagnostics raised while
    /// doing so are lost; call [`reset_to_offset`](Self::reset_to_offset)
    /// afterwards to re-lex the first token with the handler in place.
    pub fn with_diagnostic_handler(mut self, handler: DiagnosticHandler<'a>) -> Self {
        self.diag_handler = Some(handler);
        self
    }

    /// Install a lexical-exception handler. The same priming caveat as
    /// [`with_diagnostic_handler`](Self::with_diagnostic_handler) applies.
    pub fn with_exception_handler(mut self, handler: LexicalExceptionHandler<'a>) -> Self {
        self.exception_handler = Some(handler);
        self
    }

    /// The buffer this lexer scans.
    pub fn buffer_id(&self) -> BufferId {
        self.buffer_id
    }

    /// Current line number (1-based).
    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    /// The lexer flags.
    pub fn flags(&self) -> LexerFlags {
        self.flags
    }

    /// Whether comments come back as tokens.
    pub fn is_keeping_comments(&self) -> bool {
        self.opts.comment_retention == CommentRetentionMode::ReturnAsTokens
    }

    /// Whether a code-completion anchor is configured inside the scanned
    /// range.
    pub fn is_code_completion(&self) -> bool {
        self.opts
            .code_completion_offset
            .is_some_and(|off| off <= self.cursor.limit())
    }

    /// Whether a lexical exception has occurred and not been cleared.
    pub fn is_lex_exception_occurred(&self) -> bool {
        self.flags.is_lex_exception_occurred()
    }

    /// Clear the lexical-exception flag.
    pub fn clear_exception_flag(&mut self) {
        self.flags.set_lex_exception_occurred(false);
    }

    /// The message of the most recent lexical exception, if any.
    pub fn current_exception_message(&self) -> Option<&str> {
        self.current_exception_msg.as_deref()
    }

    // ─── Public lexing interface ───────────────────────────────────────

    /// Return the already-formed next token without advancing.
    pub fn peek_next_token(&self) -> &Token {
        &self.next_token
    }

    /// Lex one token. After `EndOfFile` has been returned, every further
    /// call returns `EndOfFile` again.
    pub fn lex_one(&mut self) -> Token {
        let token = self.next_token.clone();
        if !token.is(TokenKind::EndOfFile) {
            self.lex_impl();
        }
        token
    }

    /// Lex one token, handing its trivia back separately.
    pub fn lex_one_with_trivia(&mut self) -> (Token, ParsedTrivia, ParsedTrivia) {
        let token = self.lex_one();
        let leading = token.leading_trivia().clone();
        let trailing = token.trailing_trivia().clone();
        (token, leading, trailing)
    }

    /// Rewind the lexer so that the next token starts at `offset`.
    pub fn reset_to_offset(&mut self, offset: u32) {
        debug_assert!(offset <= self.cursor.limit(), "offset after range end");
        self.cursor.set_pos(offset);
        self.lex_impl();
    }

    /// Capture the state that re-lexes the currently peeked token.
    pub fn save_state(&self) -> LexerState {
        self.pending_state.clone()
    }

    /// Restore a previously saved state; the next token is re-formed from
    /// that point. Diagnostics are suppressed while re-advancing unless
    /// `enable_diagnostics` is set.
    pub fn restore_state(&mut self, state: &LexerState, enable_diagnostics: bool) {
        self.apply_state(state);
        let was = self.diags_suppressed;
        self.diags_suppressed = !enable_diagnostics;
        self.lex_impl();
        self.diags_suppressed = was;
        if !state.leading_trivia.is_empty()
            && self.opts.trivia_retention == TriviaRetentionMode::WithTrivia
        {
            self.next_token.set_leading_trivia(state.leading_trivia.clone());
        }
    }

    /// State rewinding to the beginning of the token containing `loc`,
    /// with whitespace walked back to the start of its line so that the
    /// at-start-of-line flag re-derives correctly.
    pub fn state_for_beginning_of_token_loc(&self, loc: SourceLoc) -> LexerState {
        let mut pos = self.source_mgr.offset_of_loc(loc, self.buffer_id);
        while pos > self.content_start {
            let prev = self.cursor.byte_at(pos - 1);
            if prev == b' ' || prev == b'\t' {
                pos -= 1;
                continue;
            }
            if prev == 0 && Some(pos - 1) != self.opts.code_completion_offset {
                pos -= 1;
                continue;
            }
            if prev == b'\n' || prev == b'\r' {
                pos -= 1;
            }
            break;
        }
        let mut state = self.capture_state();
        state.pos = pos;
        state
    }

    /// State rewinding to the beginning of `token`, rewinding past its
    /// attached comment if one was recorded.
    pub fn state_for_beginning_of_token(&self, token: &Token) -> LexerState {
        let start = token
            .comment_range()
            .map_or(token.span().start, |range| range.start);
        let loc = self.source_mgr.loc_for_offset(self.buffer_id, start);
        let mut state = self.state_for_beginning_of_token_loc(loc);
        if self.opts.trivia_retention == TriviaRetentionMode::WithTrivia {
            state.leading_trivia = token.leading_trivia().clone();
        }
        state
    }

    /// Get the token that starts at `loc` without disturbing this lexer.
    pub fn get_token_at(&self, loc: SourceLoc) -> Token {
        debug_assert_eq!(
            self.source_mgr.buffer_containing_loc(loc),
            Some(self.buffer_id),
            "location from the wrong buffer"
        );
        let mut lexer = Lexer::new(self.source_mgr, self.buffer_id, LexerOptions::default());
        lexer.reset_to_offset(self.source_mgr.offset_of_loc(loc, self.buffer_id));
        lexer.next_token.clone()
    }

    // ─── Driver ────────────────────────────────────────────────────────

    pub(crate) fn lex_impl(&mut self) {
        debug_assert!(self.cursor.pos() <= self.cursor.source_len());
        self.pending_state = self.capture_state();
        self.leading_trivia.clear();
        self.trailing_trivia.clear();

        if self.cursor.pos() == 0 {
            if self.content_start > 0 {
                // UTF-8 BOM becomes garbage trivia on the first token.
                let bom = self.cursor.slice(0, self.content_start).to_vec();
                self.leading_trivia.push_text(TriviaKind::GarbageText, bom);
                self.cursor.advance_n(self.content_start);
            }
            self.next_token.set_at_start_of_line(true);
        } else {
            self.next_token.set_at_start_of_line(false);
        }
        self.next_token.reset_value();

        if self.flags.is_reserve_heredoc_spaces() {
            self.flags.set_reserve_heredoc_spaces(false);
        } else if self.collects_leading_trivia() {
            self.lex_trivia(false);
        }
        self.text_start = self.cursor.pos();
        if self.flags.is_increment_line_number() {
            self.line_number += 1;
            self.flags.set_increment_line_number(false);
        }
        self.dispatch();
    }

    /// Dispatch to the scanner for the active condition. Scanners that
    /// pop their condition without forming a token report `false`, and
    /// the loop re-dispatches after collecting any trivia that became
    /// lexable in the outer condition.
    fn dispatch(&mut self) {
        loop {
            let formed = match self.condition {
                Condition::InScripting => self.scan_in_scripting(),
                Condition::LookingForProperty => self.scan_looking_for_property(),
                Condition::LookingForVarname => self.scan_looking_for_varname(),
                Condition::VarOffset => self.scan_var_offset(),
                Condition::InDoubleQuotes => self.scan_interpolated(b'"', TokenKind::DoubleQuote),
                Condition::InBackquote => self.scan_interpolated(b'`', TokenKind::Backquote),
                Condition::InHeredoc => self.scan_heredoc_like(true),
                Condition::InNowdoc => self.scan_heredoc_like(false),
                Condition::EndHeredoc => self.lex_heredoc_end(),
            };
            if formed {
                return;
            }
            if self.collects_leading_trivia() {
                self.lex_trivia(false);
            }
            self.text_start = self.cursor.pos();
        }
    }

    /// Conditions in which inter-token whitespace and comments are
    /// trivia. In string bodies every byte belongs to some token.
    fn collects_leading_trivia(&self) -> bool {
        matches!(
            self.condition,
            Condition::InScripting | Condition::LookingForProperty
        )
    }

    pub(crate) fn push_condition(&mut self, condition: Condition) {
        self.condition_stack.push(self.condition);
        self.condition = condition;
    }

    pub(crate) fn pop_condition(&mut self) {
        debug_assert!(!self.condition_stack.is_empty(), "condition stack underflow");
        if let Some(condition) = self.condition_stack.pop() {
            self.condition = condition;
        }
    }

    fn capture_state(&self) -> LexerState {
        LexerState {
            pos: self.cursor.pos(),
            condition: self.condition,
            condition_stack: self.condition_stack.clone(),
            heredoc_stack: self.heredoc_stack.clone(),
            line_number: self.line_number,
            flags: self.flags,
            leading_trivia: ParsedTrivia::new(),
        }
    }

    fn apply_state(&mut self, state: &LexerState) {
        self.cursor.set_pos(state.pos);
        self.condition = state.condition;
        self.condition_stack.clone_from(&state.condition_stack);
        self.heredoc_stack.clone_from(&state.heredoc_stack);
        self.line_number = state.line_number;
        self.flags = state.flags;
    }

    /// Run `f` as a speculative scan-ahead: diagnostics are suppressed and
    /// position, conditions, stacks, flags, line number, pending state,
    /// and the in-progress token's trivia all restore on exit.
    pub(crate) fn with_scan_ahead<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let frame = ScanAheadFrame {
            state: self.capture_state(),
            pending: self.pending_state.clone(),
            leading: std::mem::take(&mut self.leading_trivia),
            at_start_of_line: self.next_token.is_at_start_of_line(),
            diags_suppressed: self.diags_suppressed,
        };
        self.diags_suppressed = true;
        let result = f(self);
        self.apply_state(&frame.state);
        self.pending_state = frame.pending;
        self.leading_trivia = frame.leading;
        // The speculative tokens left their value and flags behind.
        self.next_token.reset_value();
        self.next_token.set_at_start_of_line(frame.at_start_of_line);
        self.diags_suppressed = frame.diags_suppressed;
        result
    }

    // ─── Trivia ────────────────────────────────────────────────────────

    /// The coalescing trivia loop. Accumulates whitespace runs, comments
    /// (unless kept as tokens), the hashbang line, and recovered garbage
    /// until a byte that can start a token is reached. Trailing trivia
    /// stops at the first line terminator: the newline belongs to the
    /// next token's leading trivia.
    pub(crate) fn lex_trivia(&mut self, for_trailing: bool) {
        let mut trivia = std::mem::take(if for_trailing {
            &mut self.trailing_trivia
        } else {
            &mut self.leading_trivia
        });

        loop {
            if self.cursor.is_at_end() {
                break;
            }
            let trivia_start = self.cursor.pos();
            let byte = self.cursor.current();
            self.cursor.advance();
            match byte {
                b'\n' => {
                    if for_trailing {
                        self.cursor.retreat_n(1);
                        break;
                    }
                    self.next_token.set_at_start_of_line(true);
                    self.line_number += 1;
                    trivia.append_or_squash(TriviaKind::Newline, 1);
                }
                b'\r' => {
                    if for_trailing {
                        self.cursor.retreat_n(1);
                        break;
                    }
                    self.next_token.set_at_start_of_line(true);
                    self.line_number += 1;
                    if self.cursor.current() == b'\n' {
                        self.cursor.advance();
                        trivia.append_or_squash(TriviaKind::CarriageReturnLineFeed, 1);
                    } else {
                        trivia.append_or_squash(TriviaKind::CarriageReturn, 1);
                    }
                }
                b' ' => trivia.append_or_squash(TriviaKind::Space, 1),
                b'\t' => trivia.append_or_squash(TriviaKind::Tab, 1),
                0x0B => trivia.append_or_squash(TriviaKind::VerticalTab, 1),
                0x0C => trivia.append_or_squash(TriviaKind::Formfeed, 1),
                b'/' => {
                    if for_trailing || self.is_keeping_comments() {
                        // Comments are not trailing trivia, and not trivia
                        // at all when they come back as tokens.
                        self.cursor.retreat_n(1);
                        break;
                    }
                    if self.cursor.current() == b'/' {
                        let is_doc = self.cursor.peek() == b'/';
                        self.cursor.advance();
                        self.cursor.eat_until_newline_or_limit();
                        let text = self.cursor.slice_from(trivia_start).to_vec();
                        trivia.push_text(
                            if is_doc { TriviaKind::DocLineComment } else { TriviaKind::LineComment },
                            text,
                        );
                    } else if self.cursor.current() == b'*' {
                        let is_doc = self.cursor.peek() == b'*';
                        self.skip_block_comment();
                        let text = self.cursor.slice_from(trivia_start).to_vec();
                        trivia.push_text(
                            if is_doc { TriviaKind::DocBlockComment } else { TriviaKind::BlockComment },
                            text,
                        );
                    } else {
                        self.cursor.retreat_n(1);
                        break;
                    }
                }
                b'#' => {
                    if trivia_start == self.content_start && self.cursor.current() == b'!' {
                        // Hashbang line is garbage trivia.
                        self.cursor.eat_until_newline_or_limit();
                        let text = self.cursor.slice_from(trivia_start).to_vec();
                        trivia.push_text(TriviaKind::GarbageText, text);
                    } else {
                        self.cursor.retreat_n(1);
                        break;
                    }
                }
                0 => {
                    match self.null_character_kind(trivia_start) {
                        NullCharacterKind::Embedded => {
                            self.diagnose(trivia_start, &LexDiag::EmbeddedNull);
                            let text = self.cursor.slice_from(trivia_start).to_vec();
                            trivia.push_text(TriviaKind::GarbageText, text);
                        }
                        NullCharacterKind::CodeCompletion | NullCharacterKind::BufferEnd => {
                            self.cursor.retreat_n(1);
                            break;
                        }
                    }
                }
                // Bytes that start tokens: delimiters, sigils, digits,
                // quotes, ASCII identifier and operator characters.
                b'@' | b'{' | b'[' | b'(' | b'}' | b']' | b')' | b',' | b';' | b':' | b'\\'
                | b'$' | b'0'..=b'9' | b'"' | b'\'' | b'`' | b'A'..=b'Z' | b'a'..=b'z' | b'_'
                | b'%' | b'!' | b'?' | b'=' | b'-' | b'+' | b'*' | b'&' | b'|' | b'^' | b'~'
                | b'.' | b'<' | b'>' => {
                    self.cursor.retreat_n(1);
                    break;
                }
                _ => {
                    // Unusual byte: a non-ASCII identifier/operator start
                    // begins a token; anything else is recovered over.
                    let mut probe = self.cursor;
                    probe.set_pos(trivia_start);
                    if advance_if_identifier_start(&mut probe) || advance_if_operator_start(&mut probe)
                    {
                        self.cursor.retreat_n(1);
                        break;
                    }
                    let should_tokenize = self.lex_unknown(trivia_start, false);
                    if should_tokenize {
                        // The junk lexes as a token; rewind so the scanner
                        // sees it from its first byte.
                        self.cursor.set_pos(trivia_start);
                        break;
                    }
                    let text = self.cursor.slice_from(trivia_start).to_vec();
                    trivia.push_text(TriviaKind::GarbageText, text);
                }
            }
        }

        if for_trailing {
            self.trailing_trivia = trivia;
        } else {
            self.leading_trivia = trivia;
        }
    }

    /// Consume a `/* ... */` comment; the cursor sits at the `*` of the
    /// opener. Block comments do not nest.
    pub(crate) fn skip_block_comment(&mut self) {
        self.cursor.advance(); // the '*'
        let mut multiline = false;
        loop {
            if self.cursor.is_at_end() {
                self.diagnose(self.cursor.pos(), &LexDiag::UnterminatedBlockComment);
                break;
            }
            let byte = self.cursor.current();
            self.cursor.advance();
            match byte {
                b'*' if self.cursor.current() == b'/' => {
                    self.cursor.advance();
                    break;
                }
                b'\n' => {
                    multiline = true;
                    self.line_number += 1;
                }
                b'\r' => {
                    multiline = true;
                    self.line_number += 1;
                    if self.cursor.current() == b'\n' {
                        self.cursor.advance();
                    }
                }
                _ => {}
            }
        }
        if multiline {
            self.next_token.set_at_start_of_line(true);
        }
    }

    /// Advance to the line terminator; with `eat_newline`, consume it and
    /// mark the next token at start of line.
    pub(crate) fn skip_to_end_of_line(&mut self, eat_newline: bool) {
        let found = self.cursor.eat_until_newline_or_limit();
        if eat_newline && found {
            let byte = self.cursor.current();
            self.cursor.advance();
            if byte == b'\r' && self.cursor.current() == b'\n' {
                self.cursor.advance();
            }
            self.line_number += 1;
            self.next_token.set_at_start_of_line(true);
        }
    }

    pub(crate) fn null_character_kind(&self, pos: u32) -> NullCharacterKind {
        if self.opts.code_completion_offset == Some(pos) {
            NullCharacterKind::CodeCompletion
        } else if pos >= self.cursor.limit() {
            NullCharacterKind::BufferEnd
        } else {
            NullCharacterKind::Embedded
        }
    }

    // ─── Token formation ───────────────────────────────────────────────

    /// Form the next token from `token_start` to the cursor. Clamps to
    /// `EndOfFile` past the artificial end, records the comment range in
    /// attach mode, attaches leading trivia, and collects trailing trivia.
    pub(crate) fn form_token(&mut self, kind: TokenKind, token_start: u32) {
        debug_assert!(self.cursor.pos() <= self.cursor.source_len());
        let mut kind = kind;
        if kind != TokenKind::EndOfFile && token_start >= self.cursor.limit() {
            kind = TokenKind::EndOfFile;
        }

        let mut comment_length = 0;
        if self.opts.comment_retention == CommentRetentionMode::AttachToNext {
            let pieces = self.leading_trivia.pieces();
            if let Some(first) = pieces.iter().position(|p| p.kind().is_comment()) {
                for piece in &pieces[first..] {
                    if piece.kind() == TriviaKind::Backtick {
                        break;
                    }
                    comment_length += piece.len();
                }
            }
        }

        let end = self.cursor.pos().max(token_start);
        self.next_token
            .set_token(kind, Span::new(token_start, end), comment_length);

        if self.opts.trivia_retention == TriviaRetentionMode::WithTrivia {
            self.next_token
                .set_leading_trivia(std::mem::take(&mut self.leading_trivia));
            if self.collects_leading_trivia() {
                self.lex_trivia(true);
            }
            self.next_token
                .set_trailing_trivia(std::mem::take(&mut self.trailing_trivia));
        } else {
            self.leading_trivia.clear();
            self.next_token.set_leading_trivia(ParsedTrivia::new());
            self.next_token.set_trailing_trivia(ParsedTrivia::new());
        }
    }

    pub(crate) fn form_variable_token(&mut self, token_start: u32) {
        self.form_token(TokenKind::Variable, token_start);
        // The span was fixed before trailing trivia moved the cursor.
        let span = self.next_token.span();
        let value = self.cursor.slice(span.start + 1, span.end).to_vec();
        self.next_token.set_value(TokenValue::Str(value.into()));
    }

    pub(crate) fn form_identifier_token(&mut self, token_start: u32) {
        self.form_token(TokenKind::IdentifierString, token_start);
        let span = self.next_token.span();
        let value = self.cursor.slice(span.start, span.end).to_vec();
        self.next_token.set_value(TokenValue::Str(value.into()));
    }

    pub(crate) fn form_string_variable_token(&mut self, token_start: u32) {
        self.form_token(TokenKind::StringVarname, token_start);
        let span = self.next_token.span();
        let value = self.cursor.slice(span.start, span.end).to_vec();
        self.next_token.set_value(TokenValue::Str(value.into()));
    }

    pub(crate) fn form_error_token(&mut self, token_start: u32) {
        self.form_token(TokenKind::Error, token_start);
        if let Some(msg) = &self.current_exception_msg {
            self.next_token
                .set_value(TokenValue::Str(msg.as_bytes().to_vec().into()));
        }
    }

    // ─── Errors and diagnostics ────────────────────────────────────────

    /// Record a lexical exception: set the flag, cache the message, and
    /// invoke the exception handler.
    pub(crate) fn notify_lexical_exception(&mut self, kind: LexErrorKind, span: Span) {
        let error = LexError::new(span, kind);
        self.flags.set_lex_exception_occurred(true);
        let message = error.to_string();
        if let Some(handler) = self.exception_handler.as_mut() {
            handler(&message, error.code());
        }
        self.current_exception_msg = Some(message);
    }

    /// Fire a diagnostic at `pos` through the handler, if any.
    pub(crate) fn diagnose(&mut self, pos: u32, diag: &LexDiag) {
        if self.diags_suppressed {
            return;
        }
        if let Some(handler) = self.diag_handler.as_mut() {
            let loc = self.source_mgr.loc_for_offset(self.buffer_id, pos);
            handler(loc, diag);
        }
    }

    /// Count the line terminators in `[start, end)` into the line number.
    pub(crate) fn handle_newlines(&mut self, start: u32, end: u32) {
        let bytes = self.cursor.slice(start, end);
        let mut count = 0u32;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => count += 1,
                b'\r' => {
                    count += 1;
                    if bytes.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        self.line_number += count;
    }

    // ─── Unknown input recovery ────────────────────────────────────────

    /// Recover at an unclassifiable byte at `start`. Returns `true` if
    /// the input should lex as a token (cursor past it), `false` if it
    /// was skipped as presumed whitespace (cursor past the damage).
    pub(crate) fn lex_unknown(&mut self, start: u32, emit_diagnostics_if_token: bool) -> bool {
        let mut probe = self.cursor;
        probe.set_pos(start);

        // A valid identifier continuation (but, per the caller, not a
        // valid start): eat the run and lex it as a token for recovery.
        {
            let mut p = probe;
            if advance_if_identifier_continuation(&mut p) {
                if emit_diagnostics_if_token {
                    self.diagnose(start, &LexDiag::InvalidIdentifierStart);
                }
                while advance_if_identifier_continuation(&mut p) {}
                self.cursor.set_pos(p.pos());
                return true;
            }
        }

        let mut p = probe;
        let code_point = validate_utf8_and_advance(&mut p);
        if code_point == INVALID_CODE_POINT {
            self.diagnose(start, &LexDiag::InvalidUtf8);
            self.cursor.set_pos(p.pos());
            return false;
        }
        if code_point == 0x00A0 {
            // Swallow the whole run of non-breaking spaces.
            while p.current() == 0xC2 && p.peek() == 0xA0 {
                p.advance_n(2);
            }
            self.diagnose(start, &LexDiag::NonBreakingSpace);
            self.cursor.set_pos(p.pos());
            return false;
        }
        if code_point == 0x201D {
            // A closing curly quote reads as a token so the parser can
            // point at it.
            if emit_diagnostics_if_token {
                self.diagnose(
                    start,
                    &LexDiag::ConfusableCharacter { found: '\u{201D}', suggestion: '"' },
                );
            }
            self.cursor.set_pos(p.pos());
            return true;
        }

        self.diagnose(start, &LexDiag::InvalidCharacter { code_point });
        if let Some(suggestion) = crate::confusables::try_confusable_to_ascii(code_point) {
            let found = char::from_u32(code_point).unwrap_or(char::REPLACEMENT_CHARACTER);
            self.diagnose(start, &LexDiag::ConfusableCharacter { found, suggestion });
        }
        self.cursor.set_pos(p.pos());
        false
    }

    // ─── Identifier / operator classification helpers ──────────────────

    /// Whether `text` is a valid non-operator identifier.
    pub fn is_identifier(text: &[u8]) -> bool {
        if text.is_empty() {
            return false;
        }
        let buffer = SourceBuffer::new(text);
        let mut cursor = buffer.cursor();
        if !advance_if_identifier_start(&mut cursor) {
            return false;
        }
        while !cursor.is_at_end() && advance_if_identifier_continuation(&mut cursor) {}
        cursor.is_at_end()
    }

    /// Whether `text` is a valid operator spelling.
    pub fn is_operator(text: &[u8]) -> bool {
        if text.is_empty() {
            return false;
        }
        let buffer = SourceBuffer::new(text);
        let mut cursor = buffer.cursor();
        if !advance_if_operator_start(&mut cursor) {
            return false;
        }
        while !cursor.is_at_end() && advance_if_operator_continuation(&mut cursor) {}
        cursor.is_at_end()
    }

    // ─── Shared scanning helpers ───────────────────────────────────────

    /// Consume a label (the cursor sits at a label-start byte) and return
    /// its bytes.
    pub(crate) fn eat_label(&mut self) -> Span {
        let start = self.cursor.pos();
        debug_assert!(is_label_start(self.cursor.current()));
        self.cursor.advance();
        self.cursor.eat_while(rill_lexer_core::is_label_continuation);
        Span::new(start, self.cursor.pos())
    }

    /// Resolve a scanned label against the keyword table.
    pub(crate) fn keyword_kind(&self, span: Span) -> Option<TokenKind> {
        keywords::lookup(self.cursor.slice(span.start, span.end))
    }

    /// Whether the byte at the cursor begins the top heredoc label, with
    /// the label fitting strictly before the artificial end.
    pub(crate) fn is_heredoc_end_marker(&self, name: &[u8]) -> bool {
        if !is_label_start(self.cursor.current()) {
            return false;
        }
        let len = u32::try_from(name.len()).unwrap_or(u32::MAX);
        // Clamp: a label that would touch the limit is not a marker.
        if len >= self.cursor.remaining() {
            return false;
        }
        let pos = self.cursor.pos();
        self.cursor.slice(pos, pos + len) == name
    }
}

/// Lex every token in a buffer, streaming them to `callback`; the
/// synthesized `EndOfFile` token is delivered last.
pub fn tokenize_all(
    source_mgr: &SourceManager,
    buffer_id: BufferId,
    opts: LexerOptions,
    mut callback: impl FnMut(&Lexer<'_>, &Token),
) {
    let mut lexer = Lexer::new(source_mgr, buffer_id, opts);
    loop {
        let token = lexer.lex_one();
        let done = token.is(TokenKind::EndOfFile);
        callback(&lexer, &token);
        if done {
            break;
        }
    }
}

/// Lex a buffer into a vector of tokens, stripping the trailing
/// end-of-file sentinel.
pub fn tokenize(source_mgr: &SourceManager, buffer_id: BufferId, opts: LexerOptions) -> Vec<Token> {
    let mut tokens = Vec::new();
    tokenize_all(source_mgr, buffer_id, opts, |_, token| tokens.push(token.clone()));
    debug_assert!(tokens.last().is_some_and(|t| t.is(TokenKind::EndOfFile)));
    tokens.pop();
    tokens
}

/// The token whose text starts at `loc`.
pub fn get_token_at_location(source_mgr: &SourceManager, loc: SourceLoc) -> Token {
    if !loc.is_valid() {
        return Token::default();
    }
    let Some(buffer_id) = source_mgr.buffer_containing_loc(loc) else {
        return Token::default();
    };
    // Comments come back as tokens so a loc at a comment start works.
    let opts = LexerOptions::default().keep_comments();
    let mut lexer = Lexer::new(source_mgr, buffer_id, opts);
    lexer.reset_to_offset(source_mgr.offset_of_loc(loc, buffer_id));
    lexer.peek_next_token().clone()
}

/// The location just past the end of the token starting at `loc`.
pub fn get_loc_for_end_of_token(source_mgr: &SourceManager, loc: SourceLoc) -> SourceLoc {
    loc.advanced_by(get_token_at_location(source_mgr, loc).len())
}

/// The start location of the token containing `offset`, re-lexing from
/// the start of its line. An offset pointing into whitespace comes back
/// unchanged.
pub fn get_loc_for_start_of_token(
    source_mgr: &SourceManager,
    buffer_id: BufferId,
    offset: u32,
) -> SourceLoc {
    let buffer = source_mgr.buffer(buffer_id);
    if offset > buffer.len() {
        return SourceLoc::invalid();
    }
    let bytes = buffer.as_sentinel_bytes();
    if matches!(bytes[offset as usize], b'\n' | b'\r' | b' ' | b'\t') {
        return source_mgr.loc_for_offset(buffer_id, offset);
    }
    let line_start = find_start_of_line(buffer.as_bytes(), offset);

    let opts = LexerOptions::default().keep_comments();
    let mut lexer = Lexer::with_range(source_mgr, buffer_id, opts, line_start, buffer.len());
    loop {
        let token = lexer.lex_one();
        let start = token.span().start;
        if start > offset {
            // Skipped past the offset: it points into trivia.
            break;
        }
        if offset < start + token.len() {
            return source_mgr.loc_for_offset(buffer_id, start);
        }
        if token.is(TokenKind::EndOfFile) {
            break;
        }
    }
    source_mgr.loc_for_offset(buffer_id, offset)
}

/// The start location of the line containing `loc`.
pub fn get_loc_for_start_of_line(source_mgr: &SourceManager, loc: SourceLoc) -> SourceLoc {
    let Some(buffer_id) = source_mgr.buffer_containing_loc(loc) else {
        return SourceLoc::invalid();
    };
    let offset = source_mgr.offset_of_loc(loc, buffer_id);
    let line_start = find_start_of_line(source_mgr.buffer(buffer_id).as_bytes(), offset);
    source_mgr.loc_for_offset(buffer_id, line_start)
}

/// The location of the start of the next line (just past this line's
/// terminator), or the end of the buffer.
pub fn get_loc_for_end_of_line(source_mgr: &SourceManager, loc: SourceLoc) -> SourceLoc {
    let Some(buffer_id) = source_mgr.buffer_containing_loc(loc) else {
        return SourceLoc::invalid();
    };
    let buffer = source_mgr.buffer(buffer_id);
    let bytes = buffer.as_bytes();
    let mut i = source_mgr.offset_of_loc(loc, buffer_id) as usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                i += 1;
                break;
            }
            b'\r' => {
                i += 1;
                if bytes.get(i) == Some(&b'\n') {
                    i += 1;
                }
                break;
            }
            _ => i += 1,
        }
    }
    #[allow(clippy::cast_possible_truncation, reason = "i <= buffer length which fits in u32")]
    let end = i as u32;
    source_mgr.loc_for_offset(buffer_id, end)
}

/// The horizontal-whitespace prefix of the line containing `loc`.
pub fn get_indentation_for_line<'m>(source_mgr: &'m SourceManager, loc: SourceLoc) -> &'m [u8] {
    let Some(buffer_id) = source_mgr.buffer_containing_loc(loc) else {
        return b"";
    };
    let bytes = source_mgr.buffer(buffer_id).as_bytes();
    let offset = source_mgr.offset_of_loc(loc, buffer_id);
    let start = find_start_of_line(bytes, offset) as usize;
    let mut end = start;
    while end < bytes.len() && is_horizontal_whitespace(bytes[end]) {
        end += 1;
    }
    &bytes[start..end]
}

/// Walk backwards from `offset` to the byte after the previous line
/// terminator (or the buffer start).
fn find_start_of_line(bytes: &[u8], offset: u32) -> u32 {
    let mut i = offset;
    while i > 0 {
        let b = bytes[i as usize - 1];
        if b == b'\n' || b == b'\r' {
            break;
        }
        i -= 1;
    }
    i
}
