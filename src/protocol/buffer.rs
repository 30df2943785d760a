//! Per-Connection Query Buffer
//!
//! Every client connection accumulates raw socket bytes here until the
//! decoder can carve a complete command out of them. TCP delivers a byte
//! stream, not messages: a single read may contain half a command, or three
//! commands and the first line of a fourth. The buffer therefore supports
//! exactly the operations the decoder needs to resume where it left off:
//!
//! - `append`: copy freshly read bytes in, growing capacity as needed
//! - `trim_prefix`: drop bytes the decoder has fully consumed
//! - `reserve_hint`: pre-reserve capacity while a large argument streams in,
//!   so we pay one allocation instead of several
//! - `adopt_with_hint`: hand the *entire* backing storage over to the caller
//!   (the zero-copy path for big arguments) and start over with a fresh,
//!   pre-sized buffer
//!
//! `BytesMut` does the heavy lifting: growth is amortized, and trimming a
//! prefix is an O(1) view adjustment rather than a memmove, so resumed
//! parses never re-scan or re-copy bytes they already consumed.

use bytes::{Buf, BytesMut};

/// Growable accumulator of unconsumed input bytes for one connection.
///
/// The buffer has a single logical owner at any time. `adopt_with_hint`
/// transfers ownership of the backing storage out (it becomes a `Value`
/// payload) and leaves a fresh buffer behind; storage is never shared
/// while still mutable.
#[derive(Debug, Default)]
pub struct QueryBuffer {
    buf: BytesMut,
}

impl QueryBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Creates an empty buffer with `capacity` bytes pre-reserved.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Appends `bytes` to the end of the buffer, growing if needed.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Removes the first `n` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the buffered length.
    pub fn trim_prefix(&mut self, n: usize) {
        self.buf.advance(n);
    }

    /// Pre-reserves space for at least `extra` more bytes without changing
    /// the logical length. Used when the decoder knows a large argument is
    /// about to stream in over several reads.
    pub fn reserve_hint(&mut self, extra: usize) {
        self.buf.reserve(extra);
    }

    /// Transfers the entire backing buffer to the caller and replaces it
    /// with a fresh empty one pre-sized to `hint` bytes.
    ///
    /// The hint anticipates the next command: if one fat argument arrived,
    /// another of similar size is likely.
    pub fn adopt_with_hint(&mut self, hint: usize) -> BytesMut {
        std::mem::replace(&mut self.buf, BytesMut::with_capacity(hint))
    }

    /// Number of buffered, unconsumed bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if no unconsumed bytes remain.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Currently reserved capacity.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// The buffered bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
