//! Lookups that walk an encoded blob in place.
//!
//! The walk starts at the root record and consumes the key one matched edge
//! at a time. Following a negative offset inflates the compressed block and
//! continues inside the inflated bytes. Offsets stored there are still
//! absolute, so the walk tracks the absolute position of the buffer it is
//! reading (`base`) and subtracts it from every offset it follows.

use std::borrow::Cow;

use crate::codec::BlockCodec;
use crate::error::{Result, TrieError};
use crate::format::{inflate_block, ChildPtr, Entry, RecordReader};

/// Read-only view of an encoded blob.
pub struct Searcher<'a, C: ?Sized> {
    blob: &'a [u8],
    codec: &'a C,
}

impl<'a, C: ?Sized> Clone for Searcher<'a, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, C: ?Sized> Copy for Searcher<'a, C> {}

/// Bytes the walk is currently reading, and their absolute position.
struct View<'a> {
    buf: Cow<'a, [u8]>,
    base: usize,
}

impl<'a> View<'a> {
    fn local(&self, abs: usize) -> Result<usize> {
        abs.checked_sub(self.base)
            .filter(|&at| at < self.buf.len())
            .ok_or_else(|| TrieError::malformed(abs, "child offset outside its block"))
    }

    /// Hand out `range` with the blob's lifetime, copying only inflated bytes.
    fn into_payload(self, range: std::ops::Range<usize>) -> Cow<'a, [u8]> {
        match self.buf {
            Cow::Borrowed(buf) => Cow::Borrowed(&buf[range]),
            Cow::Owned(mut buf) => {
                buf.truncate(range.end);
                buf.drain(..range.start);
                Cow::Owned(buf)
            }
        }
    }
}

impl<'a, C: BlockCodec + ?Sized> Searcher<'a, C> {
    pub fn new(blob: &'a [u8], codec: &'a C) -> Self {
        Self { blob, codec }
    }

    /// Payload stored under exactly `key`.
    ///
    /// Payloads from plain records are borrowed from the blob; payloads found
    /// inside a compressed block are returned owned.
    pub fn search(&self, key: &[u8]) -> Result<Option<Cow<'a, [u8]>>> {
        let mut view = View {
            buf: Cow::Borrowed(self.blob),
            base: 0,
        };
        let mut at = 0usize;
        let mut rest = key;

        loop {
            let reader = RecordReader::new(&view.buf, at)?;

            if rest.is_empty() {
                let mut data = None;
                for entry in reader {
                    if let Entry::Data(range) = entry? {
                        data = Some(range);
                        break;
                    }
                }
                return Ok(data.map(|range| view.into_payload(range)));
            }

            let mut next = None;
            for entry in reader {
                let Entry::Edge { label, child } = entry? else {
                    continue;
                };
                let matched = common_prefix_len(rest, label);
                if matched == 0 {
                    continue;
                }
                // Siblings never share a first byte, so this edge is the only
                // candidate; a partial label match means the key is absent.
                if matched < label.len() {
                    return Ok(None);
                }
                next = Some((matched, child));
                break;
            }

            let Some((matched, child)) = next else {
                return Ok(None);
            };
            rest = &rest[matched..];

            match child {
                ChildPtr::Plain(abs) => {
                    at = view.local(abs)?;
                }
                ChildPtr::Compressed(abs) => {
                    let block = view.local(abs)?;
                    let inflated = inflate_block(&view.buf, block, abs, self.codec)?;
                    tracing::trace!(offset = abs, inflated = inflated.len(), "block inflated");
                    view = View {
                        buf: Cow::Owned(inflated),
                        base: abs,
                    };
                    at = 0;
                }
            }
        }
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.search(key)?.is_some())
    }
}

#[inline]
fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
