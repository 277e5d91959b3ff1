//! Thread-safe wrapper around [`Trie`].
//!
//! Searches of an encoded trie run under a shared read lock. Inserts and the
//! implicit re-encode take the write lock, so readers never observe a
//! half-written blob.

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::codec::{BlockCodec, RawDeflate};
use crate::config::TrieConfig;
use crate::error::Result;
use crate::Trie;

pub struct SharedTrie<C = RawDeflate> {
    inner: RwLock<Trie<C>>,
}

impl SharedTrie<RawDeflate> {
    pub fn new() -> Self {
        Self::with_config(TrieConfig::default())
    }

    pub fn with_config(config: TrieConfig) -> Self {
        Self::from_trie(Trie::with_config(config))
    }
}

impl<C: BlockCodec> SharedTrie<C> {
    pub fn from_trie(trie: Trie<C>) -> Self {
        Self {
            inner: RwLock::new(trie),
        }
    }

    pub fn insert(&self, key: impl AsRef<[u8]>, value: impl Into<Vec<u8>>) -> Result<Option<Vec<u8>>> {
        self.inner.write().insert(key, value)
    }

    pub fn encode(&self) -> Result<()> {
        self.inner.write().encode()
    }

    /// Look up `key`, encoding pending inserts first.
    pub fn search(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        let key = key.as_ref();
        {
            let inner = self.inner.read();
            if inner.is_encoded() {
                return Ok(inner.get(key)?.map(|v| v.into_owned()));
            }
        }

        let mut inner = self.inner.write();
        // Another writer may have encoded while we waited for the lock.
        inner.encode()?;
        let inner = RwLockWriteGuard::downgrade(inner);
        Ok(inner.get(key)?.map(|v| v.into_owned()))
    }

    pub fn compact(&self) -> usize {
        self.inner.write().compact()
    }

    pub fn memory_usage(&self) -> usize {
        self.inner.read().memory_usage()
    }

    pub fn is_encoded(&self) -> bool {
        self.inner.read().is_encoded()
    }

    pub fn into_inner(self) -> Trie<C> {
        self.inner.into_inner()
    }
}

impl Default for SharedTrie<RawDeflate> {
    fn default() -> Self {
        Self::new()
    }
}
