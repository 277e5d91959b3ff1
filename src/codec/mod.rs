//! Block codecs for compressed subtrees.
//!
//! A codec turns an arbitrary byte range into a packed form and back. The
//! only contract is that `decompress(compress(x), limit) == x` whenever
//! `x` fits `limit`; the encoder decides which ranges get packed.

use std::io::{self, Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

/// Compressor/decompressor for subtree blocks.
pub trait BlockCodec {
    fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>>;

    /// Fails with `InvalidData` if the output would exceed `limit` bytes.
    fn decompress(&self, packed: &[u8], limit: usize) -> io::Result<Vec<u8>>;
}

impl<C: BlockCodec + ?Sized> BlockCodec for &C {
    fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>> {
        (**self).compress(raw)
    }

    fn decompress(&self, packed: &[u8], limit: usize) -> io::Result<Vec<u8>> {
        (**self).decompress(packed, limit)
    }
}

fn read_bounded(reader: impl Read, limit: usize, hint: usize) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(hint.min(limit));
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    reader.take(cap).read_to_end(&mut out)?;
    if out.len() > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("block inflates past {limit} bytes"),
        ));
    }
    Ok(out)
}

/// Raw deflate stream (no zlib or gzip framing).
#[derive(Debug, Clone, Copy)]
pub struct RawDeflate {
    level: u32,
}

impl RawDeflate {
    /// `level` ranges over 0 (store) to 9 (best).
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

impl Default for RawDeflate {
    fn default() -> Self {
        Self::new(6)
    }
}

impl BlockCodec for RawDeflate {
    fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(
            Vec::with_capacity(raw.len() / 2),
            Compression::new(self.level),
        );
        encoder.write_all(raw)?;
        encoder.finish()
    }

    fn decompress(&self, packed: &[u8], limit: usize) -> io::Result<Vec<u8>> {
        read_bounded(DeflateDecoder::new(packed), limit, packed.len() * 4)
    }
}

/// Zstandard frames.
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    level: i32,
}

impl Zstd {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for Zstd {
    fn default() -> Self {
        Self::new(3)
    }
}

impl BlockCodec for Zstd {
    fn compress(&self, raw: &[u8]) -> io::Result<Vec<u8>> {
        zstd::encode_all(raw, self.level)
    }

    fn decompress(&self, packed: &[u8], limit: usize) -> io::Result<Vec<u8>> {
        let decoder = zstd::stream::read::Decoder::with_buffer(packed)?;
        read_bounded(decoder, limit, packed.len() * 4)
    }
}
