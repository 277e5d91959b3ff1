//! Encoder and buffer configuration.

/// Default sink allocation and growth step (512 KiB).
pub const DEFAULT_ALLOC_STEP: usize = 512 * 1024;

/// Subtree sizes eligible for compression: strictly between `min` and `max` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionWindow {
    /// Exclusive lower bound
    pub min: usize,
    /// Exclusive upper bound
    pub max: usize,
}

impl CompressionWindow {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, size: usize) -> bool {
        size > self.min && size < self.max
    }
}

impl Default for CompressionWindow {
    fn default() -> Self {
        Self::new(16 * 1024, 32 * 1024)
    }
}

/// Configuration for a [`Trie`](crate::Trie).
#[derive(Debug, Clone)]
pub struct TrieConfig {
    /// Compress subtrees whose encoded size falls inside `compression_window`
    pub compress: bool,
    /// Size window for selective compression
    pub compression_window: CompressionWindow,
    /// Bytes allocated for the sink up front
    pub initial_capacity: usize,
    /// Bytes added to the sink each time a write runs past its end
    pub growth_step: usize,
}

impl TrieConfig {
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_window(mut self, min: usize, max: usize) -> Self {
        self.compression_window = CompressionWindow::new(min, max);
        self
    }
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            compress: false,
            compression_window: CompressionWindow::default(),
            initial_capacity: DEFAULT_ALLOC_STEP,
            growth_step: DEFAULT_ALLOC_STEP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds_are_exclusive() {
        let w = CompressionWindow::default();
        assert!(!w.contains(16 * 1024));
        assert!(w.contains(16 * 1024 + 1));
        assert!(w.contains(32 * 1024 - 1));
        assert!(!w.contains(32 * 1024));
    }
}
