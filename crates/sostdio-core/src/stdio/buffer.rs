//! Fixed-capacity stream buffers.
//!
//! A stream keeps one buffer per direction. The read side holds the most
//! recent block fetched from the descriptor; the write side accumulates
//! bytes until it is full or explicitly flushed. Neither performs I/O: the
//! owning stream moves bytes between these buffers and its descriptor.

/// Read-ahead buffer.
///
/// Invariant: `pos <= filled <= data.len()`. The buffer is exhausted when
/// `pos == filled`, which includes the initial (never filled) state.
#[derive(Debug)]
pub struct ReadBuffer {
    data: Box<[u8]>,
    pos: usize,
    filled: usize,
}

impl ReadBuffer {
    /// Create an empty buffer of `capacity` bytes (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)].into_boxed_slice(),
            pos: 0,
            filled: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of fetched bytes not yet delivered.
    #[must_use]
    pub fn readable(&self) -> usize {
        self.filled - self.pos
    }

    /// True when the next read must refill from the descriptor.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.filled
    }

    /// The whole backing array, to be handed to a single `read` syscall.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Record that `filled` bytes were just fetched and rewind the cursor.
    pub fn set_filled(&mut self, filled: usize) {
        self.filled = filled.min(self.data.len());
        self.pos = 0;
    }

    /// Deliver the byte at the cursor.
    pub fn next_byte(&mut self) -> Option<u8> {
        if self.is_exhausted() {
            return None;
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Some(byte)
    }

    /// Discard any fetched bytes.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.filled = 0;
    }
}

/// Write-behind buffer.
///
/// Invariant: `len <= data.len()`. A full buffer must be flushed before it
/// admits another byte.
#[derive(Debug)]
pub struct WriteBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl WriteBuffer {
    /// Create an empty buffer of `capacity` bytes (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)].into_boxed_slice(),
            len: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of pending bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// Bytes waiting to be written to the descriptor.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Append one byte. Returns `false` (and stores nothing) when full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.data[self.len] = byte;
        self.len += 1;
        true
    }

    /// Drop all pending bytes (after a flush attempt, successful or not).
    pub fn mark_flushed(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_read_buffer_is_exhausted() {
        let buf = ReadBuffer::new(16);
        assert!(buf.is_exhausted());
        assert_eq!(buf.readable(), 0);
        assert_eq!(buf.capacity(), 16);
    }

    #[test]
    fn read_buffer_delivers_filled_bytes_in_order() {
        let mut buf = ReadBuffer::new(8);
        buf.spare_mut()[..5].copy_from_slice(b"hello");
        buf.set_filled(5);
        assert_eq!(buf.readable(), 5);
        let out: Vec<u8> = std::iter::from_fn(|| buf.next_byte()).collect();
        assert_eq!(out, b"hello");
        assert!(buf.is_exhausted());
    }

    #[test]
    fn read_buffer_fill_is_clamped_to_capacity() {
        let mut buf = ReadBuffer::new(4);
        buf.set_filled(100);
        assert_eq!(buf.readable(), 4);
    }

    #[test]
    fn read_buffer_reset_discards() {
        let mut buf = ReadBuffer::new(4);
        buf.set_filled(3);
        let _ = buf.next_byte();
        buf.reset();
        assert!(buf.is_exhausted());
        assert_eq!(buf.next_byte(), None);
    }

    #[test]
    fn write_buffer_rejects_when_full() {
        let mut buf = WriteBuffer::new(3);
        assert!(buf.push(b'a'));
        assert!(buf.push(b'b'));
        assert!(buf.push(b'c'));
        assert!(buf.is_full());
        assert!(!buf.push(b'd'));
        assert_eq!(buf.pending(), b"abc");
        buf.mark_flushed();
        assert!(buf.is_empty());
        assert!(buf.push(b'd'));
        assert_eq!(buf.pending(), b"d");
    }

    #[test]
    fn zero_capacity_is_promoted_to_one() {
        assert_eq!(ReadBuffer::new(0).capacity(), 1);
        assert_eq!(WriteBuffer::new(0).capacity(), 1);
    }
}
