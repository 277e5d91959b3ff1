//! Binary record layout.
//!
//! Every trie node becomes one record:
//!
//! ```text
//! [entry_count: u16]
//! entry_count x edge:   [key_len: u8 (>0)][key bytes][child offset: i32]
//! optional data entry:  [0u8][payload_len: i32][payload bytes]
//! ```
//!
//! All integers are little-endian. The data entry, when present, is the last
//! entry and is included in `entry_count`. Child offsets are absolute
//! positions in the top-level blob. A negative offset marks a compressed
//! block at `-offset`: `[packed_len: i32][packed bytes]`, which inflates to
//! the child's records exactly as they were laid out before packing.

use std::fmt::Write as _;
use std::ops::Range;

use crate::codec::BlockCodec;
use crate::error::{Result, TrieError};

/// Longest key the one-byte edge length field allows.
pub const MAX_KEY_LEN: usize = 255;

pub const ENTRY_COUNT_SIZE: usize = 2;
pub const KEY_LEN_SIZE: usize = 1;
pub const OFFSET_SIZE: usize = 4;
/// Marker byte plus payload length, ahead of the payload itself.
pub const DATA_HEADER_SIZE: usize = KEY_LEN_SIZE + 4;
pub const BLOCK_HEADER_SIZE: usize = 4;
pub const DATA_MARKER: u8 = 0;
/// Largest offset a child pointer can hold.
pub const MAX_OFFSET: usize = i32::MAX as usize;

/// Encoded size of an edge entry with a `label_len`-byte label.
#[inline]
pub const fn edge_size(label_len: usize) -> usize {
    KEY_LEN_SIZE + label_len + OFFSET_SIZE
}

/// Decoded child offset field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildPtr {
    /// Record starts at this absolute offset.
    Plain(usize),
    /// Compressed block starts at this absolute offset.
    Compressed(usize),
}

impl ChildPtr {
    /// `at` is where the field was read, for error reporting.
    pub fn decode(raw: i32, at: usize) -> Result<Self> {
        match raw {
            0.. => Ok(ChildPtr::Plain(raw as usize)),
            i32::MIN => Err(TrieError::malformed(at, "child offset out of range")),
            _ => Ok(ChildPtr::Compressed(raw.unsigned_abs() as usize)),
        }
    }

    pub fn encode(self) -> Result<i32> {
        match self {
            ChildPtr::Plain(off) => {
                i32::try_from(off).map_err(|_| TrieError::BlobTooLarge { offset: off })
            }
            ChildPtr::Compressed(off) => i32::try_from(off)
                .map(|v| -v)
                .map_err(|_| TrieError::BlobTooLarge { offset: off }),
        }
    }

    #[inline]
    pub fn offset(self) -> usize {
        match self {
            ChildPtr::Plain(off) | ChildPtr::Compressed(off) => off,
        }
    }
}

/// One entry of a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry<'b> {
    Edge { label: &'b [u8], child: ChildPtr },
    /// Payload position within the buffer being read.
    Data(Range<usize>),
}

#[inline]
fn read_bytes<'b>(buf: &'b [u8], at: usize, len: usize, what: &'static str) -> Result<&'b [u8]> {
    at.checked_add(len)
        .and_then(|end| buf.get(at..end))
        .ok_or_else(|| TrieError::malformed(at, what))
}

#[inline]
pub(crate) fn read_u16(buf: &[u8], at: usize) -> Result<u16> {
    let b = read_bytes(buf, at, 2, "truncated entry count")?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

#[inline]
pub(crate) fn read_i32(buf: &[u8], at: usize, what: &'static str) -> Result<i32> {
    let b = read_bytes(buf, at, 4, what)?;
    Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Bounds-checked reader over the entries of a single record.
///
/// Yields entries left to right and stops after the data entry or after
/// `entry_count` entries, whichever comes first.
pub struct RecordReader<'b> {
    buf: &'b [u8],
    pos: usize,
    remaining: u16,
}

impl<'b> RecordReader<'b> {
    pub fn new(buf: &'b [u8], at: usize) -> Result<Self> {
        let remaining = read_u16(buf, at)?;
        Ok(Self {
            buf,
            pos: at + ENTRY_COUNT_SIZE,
            remaining,
        })
    }

    /// Entries left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.remaining as usize
    }

    /// Offset just past the last entry read.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    fn read_entry(&mut self) -> Result<Entry<'b>> {
        let at = self.pos;
        let key_len = read_bytes(self.buf, at, 1, "truncated entry")?[0] as usize;
        if key_len == DATA_MARKER as usize {
            let len = read_i32(self.buf, at + KEY_LEN_SIZE, "truncated payload length")?;
            let len = usize::try_from(len)
                .map_err(|_| TrieError::malformed(at, "negative payload length"))?;
            let start = at + DATA_HEADER_SIZE;
            read_bytes(self.buf, start, len, "payload runs past the buffer")?;
            self.pos = start + len;
            // Data is always the last entry.
            self.remaining = 0;
            return Ok(Entry::Data(start..start + len));
        }

        let label = read_bytes(self.buf, at + KEY_LEN_SIZE, key_len, "truncated edge key")?;
        let field = at + KEY_LEN_SIZE + key_len;
        let raw = read_i32(self.buf, field, "truncated child offset")?;
        self.pos = field + OFFSET_SIZE;
        self.remaining -= 1;
        Ok(Entry::Edge {
            label,
            child: ChildPtr::decode(raw, field)?,
        })
    }
}

impl<'b> Iterator for RecordReader<'b> {
    type Item = Result<Entry<'b>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let entry = self.read_entry();
        if entry.is_err() {
            self.remaining = 0;
        }
        Some(entry)
    }
}

/// Inflate the compressed block found at `at` in `buf`.
///
/// `abs` is the block's offset in the blob. The inflated records must still
/// be addressable from there, which bounds the output size.
pub(crate) fn inflate_block<C: BlockCodec + ?Sized>(
    buf: &[u8],
    at: usize,
    abs: usize,
    codec: &C,
) -> Result<Vec<u8>> {
    let len = read_i32(buf, at, "truncated block header")?;
    let len =
        usize::try_from(len).map_err(|_| TrieError::malformed(abs, "negative block length"))?;
    let packed = read_bytes(buf, at + BLOCK_HEADER_SIZE, len, "block runs past the buffer")?;
    codec
        .decompress(packed, MAX_OFFSET.saturating_sub(abs))
        .map_err(|_| TrieError::malformed(abs, "compressed block could not be inflated"))
}

/// Render every record reachable from the root as indented text.
///
/// Compressed blocks are inflated and shown inline beneath the edge that
/// points at them. A child must start after its parent and no path may be
/// deeper than the longest key, so a corrupt blob fails instead of looping.
pub fn dump<C: BlockCodec + ?Sized>(blob: &[u8], codec: &C) -> Result<String> {
    let mut out = String::new();
    dump_record(blob, 0, 0, 0, codec, &mut out)?;
    Ok(out)
}

fn dump_record<C: BlockCodec + ?Sized>(
    buf: &[u8],
    base: usize,
    abs: usize,
    level: usize,
    codec: &C,
    out: &mut String,
) -> Result<()> {
    if level > MAX_KEY_LEN {
        return Err(TrieError::malformed(abs, "record nested deeper than the longest key"));
    }
    let indent = "    ".repeat(level);
    let local = abs
        .checked_sub(base)
        .ok_or_else(|| TrieError::malformed(abs, "offset before block start"))?;
    let reader = RecordReader::new(buf, local)?;
    let _ = writeln!(out, "{indent}@{abs} entries={}", reader.remaining());
    for entry in reader {
        match entry? {
            Entry::Data(range) => {
                let _ = writeln!(
                    out,
                    "{indent}  data ({} bytes) {:?}",
                    range.len(),
                    String::from_utf8_lossy(&buf[range])
                );
            }
            Entry::Edge { label, child } => {
                let label = String::from_utf8_lossy(label);
                if child.offset() <= abs {
                    return Err(TrieError::malformed(abs, "child offset does not follow its parent"));
                }
                match child {
                    ChildPtr::Plain(off) => {
                        let _ = writeln!(out, "{indent}  [{label}] -> {off}");
                        dump_record(buf, base, off, level + 1, codec, out)?;
                    }
                    ChildPtr::Compressed(off) => {
                        let at = off
                            .checked_sub(base)
                            .ok_or_else(|| TrieError::malformed(off, "offset before block start"))?;
                        let inflated = inflate_block(buf, at, off, codec)?;
                        let _ = writeln!(
                            out,
                            "{indent}  [{label}] -> ~{off} (inflated {} bytes)",
                            inflated.len()
                        );
                        dump_record(&inflated, off, off, level + 1, codec, out)?;
                    }
                }
            }
        }
    }
    Ok(())
}
