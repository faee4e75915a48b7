//! Copyable cursor over a sentinel-terminated buffer.
//!
//! The cursor tracks a byte position plus an *artificial end* (`limit`):
//! scanning a subrange of a buffer stops at the limit even though valid
//! bytes continue past it. End-of-input is therefore a position check
//! (`pos >= limit`), never a byte check — interior null bytes are ordinary
//! content that the lexer diagnoses separately.
//!
//! The cursor is `Copy`, which is what makes the lexer's save/restore and
//! heredoc scan-ahead snapshots cheap.

/// Returns the earliest (minimum) of two optional match positions.
///
/// Combines results from separate memchr calls when more needles are
/// needed than a single `memchr3` supports.
fn earliest_of(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (Some(x), None) | (None, Some(x)) => Some(x),
        (None, None) => None,
    }
}

/// Cursor over a sentinel-terminated byte buffer.
///
/// Created via [`SourceBuffer::cursor()`](crate::SourceBuffer::cursor) or
/// [`SourceBuffer::cursor_at()`](crate::SourceBuffer::cursor_at).
///
/// # Invariant
///
/// `buf[source_len] == 0x00` and all bytes after it are `0x00` (cache-line
/// padding), guaranteed by `SourceBuffer` construction. `pos <= limit <=
/// source_len` except transiently while a scanner consumes a multi-byte
/// sequence that straddles the limit.
#[derive(Clone, Copy, Debug)]
pub struct Cursor<'a> {
    /// Sentinel-terminated buffer (source + sentinel + padding).
    buf: &'a [u8],
    /// Current read position (byte index into `buf`).
    pos: u32,
    /// Artificial end: scanning stops here. At most `source_len`.
    limit: u32,
    /// Length of actual source content (excludes sentinel and padding).
    source_len: u32,
}

/// Size assertion: the cursor must stay snapshot-cheap.
const _: () = assert!(std::mem::size_of::<Cursor<'static>>() <= 32);

impl<'a> Cursor<'a> {
    pub(crate) fn new(buf: &'a [u8], source_len: u32, pos: u32, limit: u32) -> Self {
        debug_assert!((source_len as usize) < buf.len());
        debug_assert!(buf[source_len as usize] == 0, "sentinel byte must be 0x00");
        debug_assert!(pos <= limit && limit <= source_len);
        Self {
            buf,
            pos,
            limit,
            source_len,
        }
    }

    /// The byte at the current position.
    ///
    /// Returns `0x00` at or past the artificial end, so a narrowed range
    /// terminates exactly like the real sentinel. Interior nulls also
    /// return `0x00`; use [`is_at_end()`](Self::is_at_end) to distinguish.
    #[inline]
    pub fn current(&self) -> u8 {
        if self.pos >= self.limit {
            0
        } else {
            self.buf[self.pos as usize]
        }
    }

    /// The byte one position ahead, `0x00` at or past the artificial end.
    #[inline]
    pub fn peek(&self) -> u8 {
        if self.pos + 1 >= self.limit {
            0
        } else {
            self.buf[self.pos as usize + 1]
        }
    }

    /// The byte two positions ahead, `0x00` at or past the artificial end.
    #[inline]
    pub fn peek2(&self) -> u8 {
        if self.pos + 2 >= self.limit {
            0
        } else {
            self.buf[self.pos as usize + 2]
        }
    }

    /// The byte at an absolute position.
    ///
    /// In-bounds for any position up to the padded allocation; reads in the
    /// sentinel/padding region return `0x00`.
    #[inline]
    pub fn byte_at(&self, pos: u32) -> u8 {
        self.buf.get(pos as usize).copied().unwrap_or(0)
    }

    /// Advance the cursor by one byte.
    #[inline]
    pub fn advance(&mut self) {
        self.pos += 1;
    }

    /// Advance the cursor by `n` bytes.
    #[inline]
    pub fn advance_n(&mut self, n: u32) {
        self.pos += n;
    }

    /// Move the cursor backwards by `n` bytes.
    #[inline]
    pub fn retreat_n(&mut self, n: u32) {
        debug_assert!(self.pos >= n);
        self.pos -= n;
    }

    /// Reposition the cursor to an absolute byte offset.
    #[inline]
    pub fn set_pos(&mut self, pos: u32) {
        self.pos = pos;
    }

    /// Returns `true` once the cursor has reached the artificial end.
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.limit
    }

    /// Current byte offset.
    #[inline]
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// The artificial end of the scanned range.
    #[inline]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Length of the underlying source content.
    #[inline]
    pub fn source_len(&self) -> u32 {
        self.source_len
    }

    /// Number of bytes remaining before the artificial end.
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.pos)
    }

    /// Extract a slice of the source content.
    ///
    /// `start..end` must fall within the content region.
    pub fn slice(&self, start: u32, end: u32) -> &'a [u8] {
        debug_assert!(start <= end && end <= self.source_len);
        &self.buf[start as usize..end as usize]
    }

    /// Extract a slice from `start` to the current position.
    pub fn slice_from(&self, start: u32) -> &'a [u8] {
        self.slice(start, self.pos)
    }

    /// Extract a source substring as `&str`.
    ///
    /// # Contract
    ///
    /// `start..end` must fall within the source content and hold valid
    /// UTF-8 on character boundaries. This is guaranteed when the range
    /// comes from the scanner's token boundary tracking over bytes it
    /// classified (numeric literals are ASCII by construction); debug
    /// builds verify it.
    #[allow(
        unsafe_code,
        reason = "from_utf8_unchecked on a range the scanner classified as valid UTF-8"
    )]
    pub fn slice_str(&self, start: u32, end: u32) -> &'a str {
        let bytes = self.slice(start, end);
        debug_assert!(
            std::str::from_utf8(bytes).is_ok(),
            "slice_str over a non-UTF-8 range {start}..{end}"
        );
        // SAFETY: the caller only requests ranges whose bytes the scanner
        // classified as ASCII or validated as UTF-8 sequences.
        unsafe { std::str::from_utf8_unchecked(bytes) }
    }

    /// Advance while `pred` holds for the current byte, stopping at the
    /// artificial end.
    ///
    /// `pred(0)` returning `false` lets the sentinel terminate the loop
    /// early, but the limit check makes that an optimization, not a
    /// requirement.
    #[inline]
    pub fn eat_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.pos < self.limit && pred(self.buf[self.pos as usize]) {
            self.pos += 1;
        }
    }

    /// Advance past horizontal whitespace (spaces and tabs).
    ///
    /// A plain byte loop beats wide loads for the short runs (1–4 bytes)
    /// that dominate real source.
    #[inline]
    pub fn eat_horizontal_whitespace(&mut self) {
        loop {
            if self.pos >= self.limit {
                break;
            }
            let b = self.buf[self.pos as usize];
            if b == b' ' || b == b'\t' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Advance to the next `\n` or `\r` byte, or the artificial end,
    /// using SIMD-accelerated search.
    ///
    /// Used by the line-comment and hashbang skippers. Returns `true` if a
    /// line terminator was found (cursor at the terminator), `false` on
    /// end-of-range (cursor at the limit).
    #[allow(clippy::cast_possible_truncation, reason = "offset < remaining which fits in u32")]
    pub fn eat_until_newline_or_limit(&mut self) -> bool {
        let remaining = &self.buf[self.pos as usize..self.limit as usize];
        match earliest_of(memchr::memchr(b'\n', remaining), memchr::memchr(b'\r', remaining)) {
            Some(offset) => {
                self.pos += offset as u32;
                true
            }
            None => {
                self.pos = self.limit;
                false
            }
        }
    }

    /// Advance past ordinary interpolated-text content to the next
    /// interesting byte and return it, or `0` at end-of-range.
    ///
    /// Interesting bytes are the interpolation anchors (`$`, `{`), the
    /// escape lead-in (`\`), line terminators, and the caller's closing
    /// `quote` byte (pass `0` for heredoc bodies, which close on a line
    /// marker instead). Uses `memchr3` for the anchor set with a secondary
    /// search for the rest.
    #[allow(clippy::cast_possible_truncation, reason = "offset < remaining which fits in u32")]
    pub fn skip_to_interp_delim(&mut self, quote: u8) -> u8 {
        let remaining = &self.buf[self.pos as usize..self.limit as usize];
        let anchors = memchr::memchr3(b'$', b'{', b'\\', remaining);
        let rest = if quote == 0 {
            earliest_of(
                memchr::memchr(b'\n', remaining),
                memchr::memchr(b'\r', remaining),
            )
        } else {
            memchr::memchr3(quote, b'\n', b'\r', remaining)
        };

        match earliest_of(anchors, rest) {
            Some(offset) => {
                self.pos += offset as u32;
                self.buf[self.pos as usize]
            }
            None => {
                self.pos = self.limit;
                0
            }
        }
    }
}
