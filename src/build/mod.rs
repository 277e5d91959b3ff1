//! Mutable build tree assembled by inserts.
//!
//! Nodes live in a single arena and refer to each other by index, so the
//! tree never needs boxed links and drops in one deallocation. Each node
//! keeps its child edges in insertion order; the encoder emits them in that
//! order, which fixes the edge order of the binary format.

use smallvec::SmallVec;

use crate::error::{Result, TrieError};
use crate::format::MAX_KEY_LEN;

/// Index of a node in the build arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, Default)]
struct BuildNode {
    /// (edge byte, child) pairs, insertion order, unique bytes.
    children: SmallVec<[(u8, NodeId); 4]>,
    data: Option<Vec<u8>>,
}

/// Pointer-free trie of pending inserts.
#[derive(Clone, Debug)]
pub struct BuildTrie {
    nodes: Vec<BuildNode>,
    keys: usize,
}

impl BuildTrie {
    pub fn new() -> Self {
        Self {
            nodes: vec![BuildNode::default()],
            keys: 0,
        }
    }

    /// Number of distinct keys holding a payload.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys == 0
    }

    /// Number of nodes, root included.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn memory_usage(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<BuildNode>()
            + self
                .nodes
                .iter()
                .map(|n| {
                    n.data.as_ref().map_or(0, Vec::capacity)
                        + if n.children.spilled() {
                            n.children.capacity() * std::mem::size_of::<(u8, NodeId)>()
                        } else {
                            0
                        }
                })
                .sum::<usize>()
    }

    /// Store `value` under `key`, returning the payload it replaced.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        if key.len() > MAX_KEY_LEN {
            return Err(TrieError::OversizedKey { len: key.len() });
        }

        let mut node = NodeId::ROOT;
        for &byte in key {
            node = match self.child(node, byte) {
                Some(child) => child,
                None => self.push_child(node, byte),
            };
        }

        let old = self.nodes[node.index()].data.replace(value);
        if old.is_none() {
            self.keys += 1;
        }
        Ok(old)
    }

    /// Payload stored exactly at `key`.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let mut node = NodeId::ROOT;
        for &byte in key {
            node = self.child(node, byte)?;
        }
        self.data(node)
    }

    #[inline]
    pub fn child(&self, node: NodeId, byte: u8) -> Option<NodeId> {
        self.nodes[node.index()]
            .children
            .iter()
            .find(|(b, _)| *b == byte)
            .map(|&(_, child)| child)
    }

    /// Child edges of `node` in insertion order.
    #[inline]
    pub fn children(&self, node: NodeId) -> &[(u8, NodeId)] {
        &self.nodes[node.index()].children
    }

    #[inline]
    pub fn data(&self, node: NodeId) -> Option<&[u8]> {
        self.nodes[node.index()].data.as_deref()
    }

    fn push_child(&mut self, parent: NodeId, byte: u8) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(BuildNode::default());
        self.nodes[parent.index()].children.push((byte, id));
        id
    }
}

impl Default for BuildTrie {
    fn default() -> Self {
        Self::new()
    }
}
