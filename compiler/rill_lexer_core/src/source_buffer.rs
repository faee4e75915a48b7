//! Sentinel-terminated source buffer for zero-bounds-check scanning.
//!
//! The buffer guarantees a `0x00` sentinel byte after the source content,
//! allowing the scanner to probe one or two bytes ahead without explicit
//! bounds checking. The total allocation is rounded up to the next 64-byte
//! boundary, which also provides safe zero padding for `peek()`/`peek2()`
//! near the end of the buffer.
//!
//! Unlike most buffers in this family, the content is raw bytes rather than
//! validated UTF-8: the lexer's recovery path for malformed UTF-8 (and for
//! interior nulls) is only reachable if such bytes can enter the buffer in
//! the first place. A UTF-8 BOM is content, not an error — it becomes
//! garbage trivia on the first token.

use crate::Cursor;

/// Cache line size in bytes, used for buffer alignment padding.
const CACHE_LINE: usize = 64;

/// Length of the UTF-8 byte order mark `EF BB BF`.
const UTF8_BOM_LEN: u32 = 3;

/// Sentinel-terminated source buffer.
///
/// # Layout
///
/// ```text
/// [source_bytes..., 0x00, padding_zeros...]
///  ^                ^     ^
///  0                |     rounded up to 64-byte boundary
///              source_len (sentinel)
/// ```
///
/// The sentinel byte at `source_len` is always `0x00`, as is every padding
/// byte after it.
#[derive(Clone, Debug)]
pub struct SourceBuffer {
    /// Owned buffer: `[source_bytes..., 0x00 sentinel, 0x00 padding...]`.
    buf: Vec<u8>,
    /// Length of the actual source content (excludes sentinel and padding).
    source_len: u32,
    /// Length of a leading UTF-8 BOM (0 or 3).
    bom_len: u32,
    /// Positions of interior null bytes, found at construction.
    interior_nulls: Vec<u32>,
}

impl SourceBuffer {
    /// Create a new sentinel-terminated buffer from raw source bytes.
    ///
    /// Copies the source into a cache-line-aligned buffer with a `0x00`
    /// sentinel appended, records whether the content starts with a UTF-8
    /// BOM, and pre-locates interior null bytes for the lexer's
    /// embedded-NUL diagnostics.
    ///
    /// # Panics
    ///
    /// Panics if the source exceeds `u32::MAX - 64` bytes; positions are
    /// stored as `u32` throughout the lexer.
    pub fn new(source: &[u8]) -> Self {
        let source_len = u32::try_from(source.len()).expect("source exceeds u32 positions");
        assert!(source.len() <= u32::MAX as usize - CACHE_LINE, "source exceeds u32 positions");

        // Round up to the next 64-byte boundary (minimum: source + sentinel).
        let padded_len = (source.len() + 1 + CACHE_LINE - 1) & !(CACHE_LINE - 1);
        let mut buf = vec![0u8; padded_len];
        buf[..source.len()].copy_from_slice(source);

        let bom_len = if source.starts_with(&[0xEF, 0xBB, 0xBF]) {
            UTF8_BOM_LEN
        } else {
            0
        };

        let mut interior_nulls = Vec::new();
        let mut offset = 0;
        while let Some(pos) = memchr::memchr(0, &source[offset..]) {
            let absolute = offset + pos;
            #[allow(clippy::cast_possible_truncation, reason = "absolute < source_len <= u32::MAX")]
            interior_nulls.push(absolute as u32);
            offset = absolute + 1;
        }

        Self {
            buf,
            source_len,
            bom_len,
            interior_nulls,
        }
    }

    /// Create a buffer from a string slice.
    pub fn from_str(source: &str) -> Self {
        Self::new(source.as_bytes())
    }

    /// The source bytes (without sentinel or padding).
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.source_len as usize]
    }

    /// The full allocation including sentinel and cache-line padding.
    ///
    /// The byte at index [`len()`](Self::len) is the sentinel (`0x00`).
    pub fn as_sentinel_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Create a [`Cursor`] positioned at byte 0, scanning the whole buffer.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(&self.buf, self.source_len, 0, self.source_len)
    }

    /// Create a [`Cursor`] over the subrange `[offset, end_offset)`.
    ///
    /// `end_offset` becomes the cursor's artificial end: scanning stops
    /// there even though the underlying buffer continues.
    ///
    /// # Panics
    ///
    /// Panics if `offset > end_offset` or `end_offset > len()`.
    pub fn cursor_at(&self, offset: u32, end_offset: u32) -> Cursor<'_> {
        assert!(offset <= end_offset, "cursor range inverted");
        assert!(end_offset <= self.source_len, "cursor range past buffer end");
        Cursor::new(&self.buf, self.source_len, offset, end_offset)
    }

    /// Length of the source content in bytes (excludes sentinel and padding).
    pub fn len(&self) -> u32 {
        self.source_len
    }

    /// Returns `true` if the source content is empty.
    pub fn is_empty(&self) -> bool {
        self.source_len == 0
    }

    /// Length of a leading UTF-8 BOM: 3 if present, 0 otherwise.
    pub fn bom_len(&self) -> u32 {
        self.bom_len
    }

    /// Byte positions of interior null bytes, in source order.
    pub fn interior_nulls(&self) -> &[u32] {
        &self.interior_nulls
    }
}

/// Size assertion: `SourceBuffer` stays pointer-sized friendly.
const _: () = assert!(std::mem::size_of::<SourceBuffer>() <= 64);
