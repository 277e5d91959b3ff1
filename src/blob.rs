//! Read-only encoded tries.
//!
//! An [`EncodedTrie`] wraps the bytes produced by the encoder, owned or
//! memory-mapped from a file. Lookups take `&self`, so one blob can serve
//! any number of reader threads.

use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;

use crate::codec::{BlockCodec, RawDeflate};
use crate::error::Result;
use crate::format;
use crate::search::Searcher;

pub struct EncodedTrie<B = Vec<u8>, C = RawDeflate> {
    bytes: B,
    codec: C,
}

impl<B: AsRef<[u8]>, C: BlockCodec> EncodedTrie<B, C> {
    /// Wrap bytes previously produced by the encoder with the same codec.
    pub fn from_bytes(bytes: B, codec: C) -> Self {
        Self { bytes, codec }
    }

    #[inline]
    pub fn searcher(&self) -> Searcher<'_, C> {
        Searcher::new(self.bytes.as_ref(), &self.codec)
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Cow<'_, [u8]>>> {
        self.searcher().search(key.as_ref())
    }

    pub fn get_str(&self, key: impl AsRef<[u8]>) -> Result<Option<String>> {
        Ok(self
            .get(key)?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    pub fn contains(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        self.searcher().contains(key.as_ref())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }

    /// Blob size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.as_ref().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn write_to(&self, mut out: impl Write) -> Result<()> {
        out.write_all(self.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    /// Indented listing of every record, for debugging.
    pub fn dump(&self) -> Result<String> {
        format::dump(self.as_bytes(), &self.codec)
    }

    pub fn into_inner(self) -> B {
        self.bytes
    }
}

impl<C: BlockCodec> EncodedTrie<Mmap, C> {
    /// Map a blob file into memory.
    ///
    /// The file must not be modified while the mapping is alive.
    pub fn open(path: impl AsRef<Path>, codec: C) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and callers guarantee the file is
        // not truncated or rewritten underneath it.
        let bytes = unsafe { Mmap::map(&file)? };
        Ok(Self { bytes, codec })
    }
}

impl<B: AsRef<[u8]>, C> std::fmt::Debug for EncodedTrie<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedTrie")
            .field("len", &self.bytes.as_ref().len())
            .finish()
    }
}
