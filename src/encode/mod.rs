//! Build tree to blob encoder.
//!
//! Records are laid out depth first. A parent's header is written before
//! any of its children, so each child offset is predicted from the header
//! size plus the sizes of the siblings already emitted, then the child is
//! encoded exactly there. When a child subtree lands inside the compression
//! window it is packed in place and its offset field is rewritten negated.

use crate::build::{BuildTrie, NodeId};
use crate::codec::BlockCodec;
use crate::config::TrieConfig;
use crate::error::{Result, TrieError};
use crate::format::{
    edge_size, ChildPtr, BLOCK_HEADER_SIZE, DATA_HEADER_SIZE, DATA_MARKER, ENTRY_COUNT_SIZE,
    OFFSET_SIZE,
};
use crate::sink::ByteSink;

/// Outcome of one encode pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    /// Keys carrying a payload
    pub keys: usize,
    /// Records written, one per build node
    pub records: usize,
    /// Subtrees replaced by compressed blocks
    pub compressed_blocks: usize,
    /// Bytes saved by compression
    pub bytes_saved: usize,
    /// Final blob size
    pub encoded_len: usize,
}

pub struct Encoder<'a, C: ?Sized> {
    sink: &'a mut ByteSink,
    codec: &'a C,
    config: &'a TrieConfig,
    stats: EncodeStats,
}

impl<'a, C: BlockCodec + ?Sized> Encoder<'a, C> {
    pub fn new(sink: &'a mut ByteSink, codec: &'a C, config: &'a TrieConfig) -> Self {
        Self {
            sink,
            codec,
            config,
            stats: EncodeStats::default(),
        }
    }

    /// Encode `trie` into the sink starting at offset 0.
    ///
    /// The sink is cleared first and truncated to the root record's total
    /// size afterwards, so it holds exactly the blob on success.
    pub fn encode(mut self, trie: &BuildTrie) -> Result<EncodeStats> {
        let _span = tracing::debug_span!(
            "encode",
            keys = trie.len(),
            nodes = trie.node_count(),
            compress = self.config.compress
        )
        .entered();

        self.sink.clear();
        let total = self.encode_node(trie, NodeId::ROOT, 0)?;
        self.sink.truncate(total);
        self.stats.keys = trie.len();
        self.stats.encoded_len = total;

        tracing::debug!(
            records = self.stats.records,
            compressed_blocks = self.stats.compressed_blocks,
            bytes_saved = self.stats.bytes_saved,
            encoded_len = total,
            "trie encoded"
        );
        Ok(self.stats)
    }

    /// Write the record for `node` at `start` followed by its subtree.
    /// Returns the number of bytes the subtree occupies.
    fn encode_node(&mut self, trie: &BuildTrie, node: NodeId, start: usize) -> Result<usize> {
        self.stats.records += 1;
        let children = trie.children(node);
        let data = trie.data(node);

        let entry_count = children.len() + usize::from(data.is_some());
        let mut at = start;
        // At most 256 edges plus one data entry.
        at += self.sink.write_u16(entry_count as u16, at);

        let edges_size = children.len() * edge_size(1);
        let mut data_size = 0;
        if let Some(payload) = data {
            let len = i32::try_from(payload.len())
                .map_err(|_| TrieError::PayloadTooLarge { len: payload.len() })?;
            let mut pos = at + edges_size;
            pos += self.sink.write_u8(DATA_MARKER, pos);
            pos += self.sink.write_i32(len, pos);
            self.sink.write_bytes(payload, pos);
            data_size = DATA_HEADER_SIZE + payload.len();
        }

        let header_size = ENTRY_COUNT_SIZE + edges_size + data_size;
        let mut total = header_size;
        for &(byte, child) in children {
            at += self.sink.write_u8(1, at);
            at += self.sink.write_u8(byte, at);

            let child_start = start + total;
            let field = at;
            at += self
                .sink
                .write_i32(ChildPtr::Plain(child_start).encode()?, field);
            debug_assert_eq!(at, field + OFFSET_SIZE);

            let mut child_size = self.encode_node(trie, child, child_start)?;
            if self.config.compress && self.config.compression_window.contains(child_size) {
                if let Some(packed_size) = self.pack(child_start, child_size)? {
                    self.sink
                        .write_i32(ChildPtr::Compressed(child_start).encode()?, field);
                    child_size = packed_size;
                }
            }
            total += child_size;
        }

        Ok(total)
    }

    /// Compress `[start, start + size)` in place.
    ///
    /// Returns the size of the resulting block, or `None` when packing would
    /// not shrink the subtree and it was left as is.
    fn pack(&mut self, start: usize, size: usize) -> Result<Option<usize>> {
        let packed = self
            .codec
            .compress(self.sink.get(start, size))
            .map_err(TrieError::Compression)?;
        let block_size = BLOCK_HEADER_SIZE + packed.len();
        if block_size >= size {
            tracing::debug!(raw = size, packed = packed.len(), "block left uncompressed");
            return Ok(None);
        }

        // Fits in i32 because it is smaller than an already encoded subtree.
        self.sink.write_i32(packed.len() as i32, start);
        self.sink.write_bytes(&packed, start + BLOCK_HEADER_SIZE);

        self.stats.compressed_blocks += 1;
        self.stats.bytes_saved += size - block_size;
        tracing::debug!(
            offset = start,
            raw = size,
            packed = packed.len(),
            ratio = format_args!("{:.1}x", size as f64 / block_size as f64),
            "subtree compressed"
        );
        Ok(Some(block_size))
    }
}
