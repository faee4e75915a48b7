//! Trivia pieces and the squashing accumulator.
//!
//! Trivia is syntactically insignificant text carried on tokens so that a
//! syntax tree can reproduce its source byte-for-byte: whitespace runs,
//! comments, the byte-order mark, and garbage the lexer recovered over.
//!
//! Pieces come in two shapes. *Count* pieces (whitespace, newlines,
//! backticks) store only a repetition count — `Space(3)` is three spaces —
//! and contiguous runs of the same kind squash. *Text* pieces (comments,
//! garbage) store their bytes verbatim and never squash across distinct
//! lexical occurrences.

/// The kinds of trivia.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TriviaKind {
    /// A run of ` ` characters.
    Space,
    /// A run of `\t` characters.
    Tab,
    /// A run of `\x0B` characters.
    VerticalTab,
    /// A run of `\x0C` characters.
    Formfeed,
    /// A run of `\n` characters.
    Newline,
    /// A run of `\r` characters.
    CarriageReturn,
    /// A run of `\r\n` pairs.
    CarriageReturnLineFeed,
    /// A run of `` ` `` characters.
    Backtick,
    /// A `//` comment, up to but not including the line terminator.
    LineComment,
    /// A `/* ... */` comment.
    BlockComment,
    /// A `///` documentation comment.
    DocLineComment,
    /// A `/** ... */` documentation comment.
    DocBlockComment,
    /// Text the lexer skipped without assigning meaning: the byte-order
    /// mark, a hashbang line, embedded nulls, unrecognized bytes.
    GarbageText,
}

impl TriviaKind {
    /// Returns `true` for the comment kinds.
    pub fn is_comment(self) -> bool {
        matches!(
            self,
            Self::LineComment | Self::BlockComment | Self::DocLineComment | Self::DocBlockComment
        )
    }

    /// Bytes contributed by one repetition of a count piece of this kind.
    fn unit_len(self) -> u32 {
        match self {
            Self::CarriageReturnLineFeed => 2,
            _ => 1,
        }
    }

    /// The byte a count piece of this kind repeats, if it is a count kind.
    fn unit_bytes(self) -> Option<&'static [u8]> {
        match self {
            Self::Space => Some(b" "),
            Self::Tab => Some(b"\t"),
            Self::VerticalTab => Some(b"\x0B"),
            Self::Formfeed => Some(b"\x0C"),
            Self::Newline => Some(b"\n"),
            Self::CarriageReturn => Some(b"\r"),
            Self::CarriageReturnLineFeed => Some(b"\r\n"),
            Self::Backtick => Some(b"`"),
            _ => None,
        }
    }
}

/// One piece of trivia: a counted repetition or an owned text run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriviaPiece {
    kind: TriviaKind,
    /// Repetition count for count kinds; always 1 for text kinds.
    count: u32,
    /// Owned bytes for text kinds; empty for count kinds. Raw bytes, not
    /// `String`: garbage trivia may carry invalid UTF-8 and must still
    /// round-trip.
    text: Box<[u8]>,
}

impl TriviaPiece {
    /// A counted piece of a count kind.
    ///
    /// # Panics
    ///
    /// Panics (debug) if `kind` is a text kind.
    pub fn counted(kind: TriviaKind, count: u32) -> Self {
        debug_assert!(kind.unit_bytes().is_some(), "counted piece of text kind {kind:?}");
        Self {
            kind,
            count,
            text: Box::default(),
        }
    }

    /// A text piece owning its bytes.
    pub fn text(kind: TriviaKind, text: impl Into<Box<[u8]>>) -> Self {
        debug_assert!(kind.unit_bytes().is_none(), "text piece of count kind {kind:?}");
        Self {
            kind,
            count: 1,
            text: text.into(),
        }
    }

    /// This piece's kind.
    pub fn kind(&self) -> TriviaKind {
        self.kind
    }

    /// Repetition count (1 for text pieces).
    pub fn count(&self) -> u32 {
        self.count
    }

    /// The owned bytes of a text piece, if this is one.
    pub fn text_bytes(&self) -> Option<&[u8]> {
        if self.kind.unit_bytes().is_none() {
            Some(&self.text)
        } else {
            None
        }
    }

    /// Source length of this piece in bytes.
    pub fn len(&self) -> u32 {
        match self.kind.unit_bytes() {
            Some(_) => self.count * self.kind.unit_len(),
            None => u32::try_from(self.text.len()).unwrap_or(u32::MAX),
        }
    }

    /// Returns `true` for zero-length pieces (never produced by the lexer).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append this piece's source bytes to `out`.
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        match self.kind.unit_bytes() {
            Some(unit) => {
                for _ in 0..self.count {
                    out.extend_from_slice(unit);
                }
            }
            None => out.extend_from_slice(&self.text),
        }
    }
}

/// An ordered list of trivia pieces with squashing append.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedTrivia {
    pieces: Vec<TriviaPiece>,
}

impl ParsedTrivia {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `count` repetitions of a count kind, merging into the last
    /// piece when it has the same kind.
    pub fn append_or_squash(&mut self, kind: TriviaKind, count: u32) {
        debug_assert!(kind.unit_bytes().is_some());
        if let Some(last) = self.pieces.last_mut() {
            if last.kind == kind {
                last.count += count;
                return;
            }
        }
        self.pieces.push(TriviaPiece::counted(kind, count));
    }

    /// Append a text piece. Text pieces never squash: each lexical
    /// occurrence stays distinct.
    pub fn push_text(&mut self, kind: TriviaKind, text: impl Into<Box<[u8]>>) {
        self.pieces.push(TriviaPiece::text(kind, text));
    }

    /// The pieces in source order.
    pub fn pieces(&self) -> &[TriviaPiece] {
        &self.pieces
    }

    /// Iterate over the pieces.
    pub fn iter(&self) -> std::slice::Iter<'_, TriviaPiece> {
        self.pieces.iter()
    }

    /// Total source length in bytes.
    pub fn len(&self) -> u32 {
        self.pieces.iter().map(TriviaPiece::len).sum()
    }

    /// Returns `true` when no pieces are present.
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Discard all pieces, keeping the allocation.
    pub fn clear(&mut self) {
        self.pieces.clear();
    }

    /// Returns `true` if any piece is a newline kind.
    pub fn contains_newline(&self) -> bool {
        self.pieces.iter().any(|p| {
            matches!(
                p.kind,
                TriviaKind::Newline | TriviaKind::CarriageReturn | TriviaKind::CarriageReturnLineFeed
            )
        })
    }

    /// Append the concatenated source bytes of all pieces to `out`.
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        for piece in &self.pieces {
            piece.write_bytes(out);
        }
    }
}

impl<'a> IntoIterator for &'a ParsedTrivia {
    type Item = &'a TriviaPiece;
    type IntoIter = std::slice::Iter<'a, TriviaPiece>;

    fn into_iter(self) -> Self::IntoIter {
        self.pieces.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counted_pieces_squash() {
        let mut trivia = ParsedTrivia::new();
        trivia.append_or_squash(TriviaKind::Space, 1);
        trivia.append_or_squash(TriviaKind::Space, 1);
        trivia.append_or_squash(TriviaKind::Space, 2);
        assert_eq!(trivia.pieces().len(), 1);
        assert_eq!(trivia.pieces()[0].count(), 4);
        assert_eq!(trivia.len(), 4);
    }

    #[test]
    fn different_kinds_do_not_squash() {
        let mut trivia = ParsedTrivia::new();
        trivia.append_or_squash(TriviaKind::Space, 1);
        trivia.append_or_squash(TriviaKind::Tab, 1);
        trivia.append_or_squash(TriviaKind::Space, 1);
        assert_eq!(trivia.pieces().len(), 3);
    }

    #[test]
    fn crlf_counts_two_bytes_per_unit() {
        let mut trivia = ParsedTrivia::new();
        trivia.append_or_squash(TriviaKind::CarriageReturnLineFeed, 2);
        assert_eq!(trivia.len(), 4);
        let mut out = Vec::new();
        trivia.write_bytes(&mut out);
        assert_eq!(out, b"\r\n\r\n");
    }

    #[test]
    fn comments_append_without_squashing() {
        let mut trivia = ParsedTrivia::new();
        trivia.push_text(TriviaKind::LineComment, *b"// a");
        trivia.push_text(TriviaKind::LineComment, *b"// b");
        assert_eq!(trivia.pieces().len(), 2);
        assert_eq!(trivia.len(), 8);
        assert_eq!(trivia.pieces()[0].text_bytes(), Some(b"// a".as_slice()));
    }

    #[test]
    fn garbage_preserves_raw_bytes() {
        let mut trivia = ParsedTrivia::new();
        trivia.push_text(TriviaKind::GarbageText, *b"\xEF\xBB\xBF");
        let mut out = Vec::new();
        trivia.write_bytes(&mut out);
        assert_eq!(out, b"\xEF\xBB\xBF");
    }

    #[test]
    fn newline_detection() {
        let mut trivia = ParsedTrivia::new();
        trivia.append_or_squash(TriviaKind::Space, 2);
        assert!(!trivia.contains_newline());
        trivia.append_or_squash(TriviaKind::CarriageReturn, 1);
        assert!(trivia.contains_newline());
    }

    #[test]
    fn write_bytes_round_trips_mixed_list() {
        let mut trivia = ParsedTrivia::new();
        trivia.append_or_squash(TriviaKind::Space, 2);
        trivia.push_text(TriviaKind::BlockComment, *b"/* hi */");
        trivia.append_or_squash(TriviaKind::Newline, 1);
        let mut out = Vec::new();
        trivia.write_bytes(&mut out);
        assert_eq!(out, b"  /* hi */\n");
        assert_eq!(trivia.len() as usize, out.len());
    }
}
