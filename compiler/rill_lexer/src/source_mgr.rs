//! Buffer registry mapping opaque locations to buffer-local offsets.
//!
//! The lexer itself works in buffer-local byte offsets; tooling passes
//! around [`SourceLoc`] values that stay meaningful across buffers. The
//! manager owns the buffers and the offset↔location arithmetic. Consecutive
//! buffers are separated by a one-byte gap in the global offset space so
//! the location one past a buffer's end (the end-of-file token) still maps
//! back to that buffer unambiguously.

use crate::span::SourceLoc;
use rill_lexer_core::SourceBuffer;

/// Identifier of a buffer registered with a [`SourceManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(u32);

impl BufferId {
    /// The raw index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

struct RegisteredBuffer {
    buffer: SourceBuffer,
    /// Global offset of the buffer's first byte.
    global_start: u32,
}

/// Owns source buffers and maps [`SourceLoc`]s to buffer offsets.
#[derive(Default)]
pub struct SourceManager {
    buffers: Vec<RegisteredBuffer>,
}

impl SourceManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a buffer built from raw bytes, returning its id.
    pub fn add_buffer(&mut self, source: &[u8]) -> BufferId {
        self.add_source_buffer(SourceBuffer::new(source))
    }

    /// Register an already-built buffer, returning its id.
    pub fn add_source_buffer(&mut self, buffer: SourceBuffer) -> BufferId {
        let global_start = match self.buffers.last() {
            // +1 gap: the end-of-buffer location stays inside the range.
            Some(prev) => prev.global_start + prev.buffer.len() + 1,
            None => 0,
        };
        let id = BufferId(u32::try_from(self.buffers.len()).expect("buffer count exceeds u32"));
        self.buffers.push(RegisteredBuffer { buffer, global_start });
        id
    }

    /// The buffer registered under `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this manager.
    pub fn buffer(&self, id: BufferId) -> &SourceBuffer {
        &self.buffers[id.index()].buffer
    }

    /// Global location of the buffer's first byte plus its byte length.
    pub fn range_for_buffer(&self, id: BufferId) -> (SourceLoc, u32) {
        let reg = &self.buffers[id.index()];
        (SourceLoc::from_raw(reg.global_start), reg.buffer.len())
    }

    /// Buffer-local offset of `loc` within `id`.
    ///
    /// # Panics
    ///
    /// Panics if `loc` does not fall within the buffer's range.
    pub fn offset_of_loc(&self, loc: SourceLoc, id: BufferId) -> u32 {
        let reg = &self.buffers[id.index()];
        assert!(loc.is_valid(), "offset of invalid location");
        let offset = loc.raw().checked_sub(reg.global_start).expect("location before buffer");
        assert!(offset <= reg.buffer.len(), "location past buffer end");
        offset
    }

    /// Global location of a buffer-local offset.
    pub fn loc_for_offset(&self, id: BufferId, offset: u32) -> SourceLoc {
        let reg = &self.buffers[id.index()];
        debug_assert!(offset <= reg.buffer.len());
        SourceLoc::from_raw(reg.global_start + offset)
    }

    /// The buffer whose range contains `loc`, if any.
    ///
    /// The location one past a buffer's last byte (the end-of-file
    /// position) belongs to that buffer.
    pub fn buffer_containing_loc(&self, loc: SourceLoc) -> Option<BufferId> {
        if !loc.is_valid() {
            return None;
        }
        let raw = loc.raw();
        let idx = self
            .buffers
            .partition_point(|reg| reg.global_start <= raw)
            .checked_sub(1)?;
        let reg = &self.buffers[idx];
        if raw > reg.global_start + reg.buffer.len() {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, reason = "buffer count checked at registration")]
        let id = BufferId(idx as u32);
        Some(id)
    }
}
