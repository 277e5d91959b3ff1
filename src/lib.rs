//! # unraveled
//!
//! A trie that is built in memory and then compiled into a single flat,
//! offset-addressed blob. Lookups walk the encoded bytes directly and never
//! rebuild a tree. Mid-sized subtrees can be compressed in place and are
//! inflated on demand during a lookup.
//!
//! ## Example
//!
//! ```rust
//! use unraveled::Trie;
//!
//! let mut trie = Trie::new();
//! trie.insert("hello", "world")?;
//! trie.insert("help", "me")?;
//!
//! assert_eq!(trie.search_str("hello")?, Some("world".to_string()));
//! assert_eq!(trie.search("hel")?, None);
//! # Ok::<(), unraveled::TrieError>(())
//! ```
//!
//! ## Lifecycle
//!
//! A [`Trie`] is either *building* (collecting inserts in a mutable tree) or
//! *encoded* (serving lookups from the blob). [`Trie::encode`] compiles the
//! pending tree and drops it; [`Trie::search`] encodes implicitly when there
//! are pending inserts. Inserting into an encoded trie starts a fresh build
//! tree, and the next encode replaces the blob with the new keys only.

#![deny(unsafe_op_in_unsafe_fn)]

pub mod blob;
pub mod build;
pub mod codec;
pub mod config;
pub mod encode;
pub mod error;
pub mod format;
pub mod search;
pub mod shared;
pub mod sink;

pub use blob::EncodedTrie;
pub use build::BuildTrie;
pub use codec::{BlockCodec, RawDeflate, Zstd};
pub use config::{CompressionWindow, TrieConfig};
pub use encode::{EncodeStats, Encoder};
pub use error::{Result, TrieError};
pub use search::Searcher;
pub use shared::SharedTrie;
pub use sink::{ByteSink, SinkStats};

use std::borrow::Cow;

enum Mode {
    Building(BuildTrie),
    Encoded,
}

/// Trie with an in-memory build phase and an encoded lookup phase.
pub struct Trie<C = RawDeflate> {
    mode: Mode,
    sink: ByteSink,
    codec: C,
    config: TrieConfig,
    stats: Option<EncodeStats>,
}

impl Trie<RawDeflate> {
    pub fn new() -> Self {
        Self::with_config(TrieConfig::default())
    }

    pub fn with_config(config: TrieConfig) -> Self {
        Self::with_codec(config, RawDeflate::default())
    }
}

impl<C: BlockCodec> Trie<C> {
    pub fn with_codec(config: TrieConfig, codec: C) -> Self {
        Self {
            mode: Mode::Building(BuildTrie::new()),
            sink: ByteSink::with_capacity(config.initial_capacity, config.growth_step),
            codec,
            config,
            stats: None,
        }
    }

    /// Store `value` under `key`, replacing any payload pending for that key.
    ///
    /// Keys are limited to 255 bytes. Marks the trie dirty, even on error.
    pub fn insert(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl Into<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>> {
        let key = key.as_ref();
        match &mut self.mode {
            Mode::Building(tree) => tree.insert(key, value.into()),
            Mode::Encoded => {
                let mut tree = BuildTrie::new();
                let old = tree.insert(key, value.into());
                self.mode = Mode::Building(tree);
                old
            }
        }
    }

    /// Compile pending inserts into the blob. No-op when already encoded.
    ///
    /// On error the pending tree is kept so the call can be retried.
    pub fn encode(&mut self) -> Result<()> {
        let Mode::Building(tree) = &self.mode else {
            return Ok(());
        };
        let stats = Encoder::new(&mut self.sink, &self.codec, &self.config).encode(tree)?;
        self.stats = Some(stats);
        self.mode = Mode::Encoded;
        Ok(())
    }

    /// Look up `key`, encoding pending inserts first.
    pub fn search(&mut self, key: impl AsRef<[u8]>) -> Result<Option<Cow<'_, [u8]>>> {
        self.encode()?;
        self.get(key)
    }

    /// [`search`](Self::search) for text payloads; invalid UTF-8 is replaced.
    pub fn search_str(&mut self, key: impl AsRef<[u8]>) -> Result<Option<String>> {
        Ok(self
            .search(key)?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    /// Look up `key` without encoding. Fails with [`TrieError::NotEncoded`]
    /// while inserts are pending.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Cow<'_, [u8]>>> {
        self.searcher()?.search(key.as_ref())
    }

    pub fn searcher(&self) -> Result<Searcher<'_, C>> {
        match self.mode {
            Mode::Encoded => Ok(Searcher::new(self.sink.as_slice(), &self.codec)),
            Mode::Building(_) => Err(TrieError::NotEncoded),
        }
    }

    #[inline]
    pub fn is_encoded(&self) -> bool {
        matches!(self.mode, Mode::Encoded)
    }

    /// Keys pending in the build tree, or held by the blob once encoded.
    pub fn len(&self) -> usize {
        match &self.mode {
            Mode::Building(tree) => tree.len(),
            Mode::Encoded => self.stats.map_or(0, |s| s.keys),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes of backing storage: the sink plus any pending build tree.
    pub fn memory_usage(&self) -> usize {
        let tree = match &self.mode {
            Mode::Building(tree) => tree.memory_usage(),
            Mode::Encoded => 0,
        };
        self.sink.capacity() + tree
    }

    /// Size of the encoded blob, zero while inserts are pending.
    pub fn encoded_len(&self) -> usize {
        if self.is_encoded() {
            self.sink.len()
        } else {
            0
        }
    }

    /// Release unused sink capacity. Returns the bytes reclaimed.
    pub fn compact(&mut self) -> usize {
        let reclaimed = self.sink.compact();
        tracing::debug!(reclaimed, "sink compacted");
        reclaimed
    }

    /// Statistics of the last successful encode.
    pub fn stats(&self) -> Option<&EncodeStats> {
        self.stats.as_ref()
    }

    pub fn sink_stats(&self) -> SinkStats {
        self.sink.stats()
    }

    pub fn config(&self) -> &TrieConfig {
        &self.config
    }

    /// Indented listing of the encoded records.
    pub fn dump(&self) -> Result<String> {
        match self.mode {
            Mode::Encoded => format::dump(self.sink.as_slice(), &self.codec),
            Mode::Building(_) => Err(TrieError::NotEncoded),
        }
    }

    /// Encode if needed and hand the blob over as a read-only trie.
    pub fn freeze(mut self) -> Result<EncodedTrie<Vec<u8>, C>> {
        self.encode()?;
        Ok(EncodedTrie::from_bytes(self.sink.into_vec(), self.codec))
    }
}

impl Default for Trie<RawDeflate> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for Trie<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Trie");
        match &self.mode {
            Mode::Building(tree) => s.field("pending_keys", &tree.len()),
            Mode::Encoded => s.field("encoded_len", &self.sink.len()),
        };
        s.field("compress", &self.config.compress).finish()
    }
}


#[cfg(test)]
mod proptests;
