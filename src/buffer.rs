//! Fixed-capacity staging buffer for compressed bytes.
//!
//! The buffer sits between the codec engine and the underlying handle.  Its
//! live bytes are always `data[start..end]`:
//!
//! ```text
//! | consumed | pending (start..end) | spare (end..capacity) |
//! ```
//!
//! On the read path `pending` holds compressed bytes awaiting decode and the
//! spare region is refilled from storage.  On the write path the encoder
//! appends into `spare` and `pending` is drained to storage.  Both paths only
//! move the cursors through [`StagingBuffer::commit`] and
//! [`StagingBuffer::consume`], which clamp to the live region.

/// Default staging capacity in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

#[derive(Debug)]
pub struct StagingBuffer {
    data:  Box<[u8]>,
    start: usize,
    end:   usize,
}

impl StagingBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data:  vec![0u8; capacity.max(1)].into_boxed_slice(),
            start: 0,
            end:   0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes staged and not yet consumed.
    #[inline]
    pub fn pending(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// No spare room left after `pending`.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.end == self.data.len()
    }

    /// Writable region following the pending bytes.
    #[inline]
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.end..]
    }

    /// Mark `n` bytes of the spare region as pending.
    pub fn commit(&mut self, n: usize) {
        self.end += n.min(self.data.len() - self.end);
    }

    /// Drop `n` bytes from the front of the pending region.  The cursors
    /// rewind once everything is consumed so the whole capacity is spare.
    pub fn consume(&mut self, n: usize) {
        self.start += n.min(self.len());
        if self.start == self.end {
            self.clear();
        }
    }

    /// Move the pending bytes to the front of the buffer.
    pub fn compact(&mut self) {
        if self.start > 0 {
            self.data.copy_within(self.start..self.end, 0);
            self.end  -= self.start;
            self.start = 0;
        }
    }

    pub fn clear(&mut self) {
        self.start = 0;
        self.end   = 0;
    }
}

impl Default for StagingBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_and_consume_track_live_region() {
        let mut buf = StagingBuffer::with_capacity(8);
        buf.spare_mut()[..5].copy_from_slice(b"hello");
        buf.commit(5);
        assert_eq!(buf.pending(), b"hello");
        assert_eq!(buf.spare_mut().len(), 3);

        buf.consume(2);
        assert_eq!(buf.pending(), b"llo");
        assert!(!buf.is_full());
    }

    #[test]
    fn cursors_clamp_to_bounds() {
        let mut buf = StagingBuffer::with_capacity(4);
        buf.commit(100);
        assert!(buf.is_full());
        assert_eq!(buf.len(), 4);
        buf.consume(100);
        assert!(buf.is_empty());
        assert_eq!(buf.spare_mut().len(), 4);
    }

    #[test]
    fn compact_moves_tail_to_front() {
        let mut buf = StagingBuffer::with_capacity(6);
        buf.spare_mut().copy_from_slice(b"abcdef");
        buf.commit(6);
        buf.consume(4);
        assert!(buf.is_full());

        buf.compact();
        assert_eq!(buf.pending(), b"ef");
        assert_eq!(buf.spare_mut().len(), 4);
    }

    #[test]
    fn zero_capacity_is_promoted() {
        assert_eq!(StagingBuffer::with_capacity(0).capacity(), 1);
        assert_eq!(StagingBuffer::default().capacity(), DEFAULT_BUFFER_SIZE);
    }
}
