//! Growable, offset-addressed byte buffer.
//!
//! The encoder writes records at absolute offsets that may lie past the
//! current end of the buffer; the sink grows in fixed steps to cover them.
//! Everything beyond the high-water mark is zero-filled slack.

use std::time::{Duration, Instant};

use crate::config::DEFAULT_ALLOC_STEP;

/// Growth statistics for a [`ByteSink`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SinkStats {
    /// Number of times the buffer was reallocated to cover a write
    pub grow_count: usize,
    /// Wall time spent growing
    pub grow_time: Duration,
}

/// Byte buffer with fixed-width little-endian writes at arbitrary offsets.
#[derive(Clone)]
pub struct ByteSink {
    data: Vec<u8>,
    /// High-water mark: one past the last byte ever written.
    len: usize,
    growth_step: usize,
    stats: SinkStats,
}

impl ByteSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ALLOC_STEP, DEFAULT_ALLOC_STEP)
    }

    /// Create a sink with `initial` zeroed bytes that grows by `growth_step`.
    pub fn with_capacity(initial: usize, growth_step: usize) -> Self {
        Self {
            data: vec![0u8; initial],
            len: 0,
            growth_step: growth_step.max(1),
            stats: SinkStats::default(),
        }
    }

    /// Bytes written so far (the high-water mark).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes of backing storage currently held.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    /// The written prefix of the buffer.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// `len` written bytes starting at `at`.
    ///
    /// # Panics
    /// Panics if the range runs past the high-water mark.
    #[inline]
    pub fn get(&self, at: usize, len: usize) -> &[u8] {
        &self.as_slice()[at..at + len]
    }

    fn ensure(&mut self, at: usize, size: usize) {
        let end = at + size;
        if end > self.data.len() {
            let started = Instant::now();
            let missing = end - self.data.len();
            let steps = missing.div_ceil(self.growth_step);
            let new_len = self.data.len() + steps * self.growth_step;
            self.data.resize(new_len, 0);
            self.stats.grow_count += 1;
            self.stats.grow_time += started.elapsed();
            tracing::trace!(new_len, "sink grown");
        }
        self.len = self.len.max(end);
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8, at: usize) -> usize {
        self.ensure(at, 1);
        self.data[at] = value;
        1
    }

    #[inline]
    pub fn write_u16(&mut self, value: u16, at: usize) -> usize {
        self.write_bytes(&value.to_le_bytes(), at)
    }

    #[inline]
    pub fn write_i32(&mut self, value: i32, at: usize) -> usize {
        self.write_bytes(&value.to_le_bytes(), at)
    }

    /// Copy `bytes` to `at`, returning the number of bytes written.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8], at: usize) -> usize {
        self.ensure(at, bytes.len());
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
        bytes.len()
    }

    /// Drop everything past `len` from the written region.
    ///
    /// The dropped bytes are zeroed so a later write that grows the region
    /// again never exposes stale content.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.data[len..self.len].fill(0);
            self.len = len;
        }
    }

    /// Forget all written bytes, keeping the allocation.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Release the slack past the high-water mark. Returns the bytes reclaimed.
    pub fn compact(&mut self) -> usize {
        let before = self.data.capacity();
        self.data.truncate(self.len);
        self.data.shrink_to_fit();
        before.saturating_sub(self.data.capacity())
    }

    /// Take the written bytes, dropping the slack.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.truncate(self.len);
        self.data
    }
}

impl Default for ByteSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ByteSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSink")
            .field("len", &self.len)
            .field("capacity", &self.data.capacity())
            .field("grow_count", &self.stats.grow_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_are_little_endian() {
        let mut sink = ByteSink::with_capacity(16, 16);
        assert_eq!(sink.write_u16(0x0102, 0), 2);
        assert_eq!(sink.write_i32(-2, 2), 4);
        assert_eq!(sink.write_u8(7, 6), 1);
        assert_eq!(sink.as_slice(), &[0x02, 0x01, 0xFE, 0xFF, 0xFF, 0xFF, 7]);
    }

    #[test]
    fn test_grows_past_capacity() {
        let mut sink = ByteSink::with_capacity(4, 8);
        sink.write_bytes(b"0123456789abcdef0123", 2);
        assert_eq!(sink.len(), 22);
        assert_eq!(sink.get(2, 4), b"0123");
        assert_eq!(sink.stats().grow_count, 1);
        // 4 + 3 steps of 8 covers 22 bytes.
        assert!(sink.capacity() >= 28);
    }

    #[test]
    fn test_sparse_write_leaves_zero_gap() {
        let mut sink = ByteSink::with_capacity(0, 4);
        sink.write_u8(9, 10);
        assert_eq!(sink.len(), 11);
        assert!(sink.as_slice()[..10].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_truncate_and_compact() {
        let mut sink = ByteSink::with_capacity(1024, 1024);
        sink.write_bytes(&[1u8; 100], 0);
        sink.truncate(10);
        assert_eq!(sink.len(), 10);

        // Bytes past the truncation point read back as zero once rewritten around.
        sink.write_u8(2, 20);
        assert!(sink.as_slice()[10..20].iter().all(|&b| b == 0));

        let reclaimed = sink.compact();
        assert!(reclaimed > 0);
        assert_eq!(sink.as_slice().len(), 21);
        assert_eq!(sink.into_vec().len(), 21);
    }
}
