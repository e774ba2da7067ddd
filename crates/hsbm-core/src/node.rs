use std::collections::HashMap;

use hsbm_types::{LevelT, NodeId, NodeTypeT};

/// A single vertex of the multi-level block hierarchy.
///
/// At level 0 a node is an observed ("data") node: it carries a user-given
/// `id` and an ordered list of `neighbors` (self-edges appear twice, once per
/// half-edge). At level >= 1 a node is a block: it carries an engine-generated
/// `id` and a list of `children` one level below, and `neighbors` stays empty.
/// A node never has both populated, matching the data/block split in the
/// reimplementation notes: one record, no inheritance.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub level: LevelT,
    pub node_type: NodeTypeT,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub neighbors: Vec<NodeId>,
    degree: i64,
    pub(crate) alive: bool,
}

impl Node {
    pub fn new(id: String, level: LevelT, node_type: NodeTypeT) -> Self {
        Self {
            id,
            level,
            node_type,
            parent: None,
            children: Vec::new(),
            neighbors: Vec::new(),
            degree: 0,
            alive: true,
        }
    }

    #[inline(always)]
    pub fn degree(&self) -> i64 {
        self.degree
    }

    #[inline(always)]
    pub(crate) fn adjust_degree(&mut self, delta: i64) {
        self.degree += delta;
    }

    /// True for a block with no children. Level-0 nodes are never "empty" in
    /// this sense.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.level > 0 && self.children.is_empty()
    }

    #[inline(always)]
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    #[inline(always)]
    pub fn num_children(&self) -> usize {
        self.children.len()
    }
}

/// Mapping from a block at some level to the number of half-edges a node
/// or block contributes to it, gathered via [`Network::gather_neighbors_at_level`](crate::network::Network::gather_neighbors_at_level).
pub type NeighborCounts = HashMap<NodeId, i64>;
