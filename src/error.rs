//! Error types for building, encoding and searching tries.

use std::io;

use thiserror::Error;

use crate::format::MAX_KEY_LEN;

pub type Result<T> = std::result::Result<T, TrieError>;

#[derive(Error, Debug)]
pub enum TrieError {
    #[error("key of {len} bytes exceeds the {max}-byte limit", max = MAX_KEY_LEN)]
    OversizedKey { len: usize },

    #[error("payload of {len} bytes does not fit a 32-bit length field")]
    PayloadTooLarge { len: usize },

    #[error("record offset {offset} does not fit a 32-bit offset field")]
    BlobTooLarge { offset: usize },

    #[error("malformed record at offset {offset}: {reason}")]
    MalformedRecord { offset: usize, reason: &'static str },

    #[error("block compression failed: {0}")]
    Compression(#[source] io::Error),

    #[error("trie has pending inserts; encode it before read-only lookups")]
    NotEncoded,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TrieError {
    pub(crate) fn malformed(offset: usize, reason: &'static str) -> Self {
        TrieError::MalformedRecord { offset, reason }
    }

    /// True for errors that indicate a corrupt or truncated blob.
    pub fn is_corruption(&self) -> bool {
        matches!(self, TrieError::MalformedRecord { .. })
    }
}
