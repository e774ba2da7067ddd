use std::collections::{HashMap, HashSet};

use hsbm_types::{EngineError, LevelT, NodeId, NodeTypeT, Result};
use itertools::Itertools;

use crate::node::{NeighborCounts, Node};
use crate::ordered_pair::OrderedPair;
use crate::sampler::Sampler;

/// Whether edges may connect any two types, or only a declared subset.
#[derive(Debug, Clone)]
pub enum PartiteStructure {
    Unipartite,
    Multipartite,
    MultipartiteRestricted(HashSet<OrderedPair<NodeTypeT>>),
}

/// One row of a [`Network::state`] dump: `(id, type_name, parent_id, level)`.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRow {
    pub id: String,
    pub type_name: String,
    pub parent_id: Option<String>,
    pub level: LevelT,
}

pub type StateDump = Vec<StateRow>;

/// `OrderedPair<NodeId> -> edge count` at a given block level.
///
/// Self pairs count each half-edge, so a block with `k` internal edges
/// contributes `2k` to its own diagonal entry; entropy terms over a
/// diagonal pair are halved to compensate (see [`crate::move_results`]).
pub type InterBlockEdgeCounts = HashMap<OrderedPair<NodeId>, i64>;

/// Owns every node across every level and mediates all structural mutation:
/// adding nodes/edges, building and tearing down block levels, re-parenting,
/// and projecting edge counts up to a block level.
pub struct Network {
    nodes: Vec<Node>,
    /// `levels[level][type] -> ordered node ids at that level/type`.
    levels: Vec<HashMap<NodeTypeT, Vec<NodeId>>>,
    id_index: HashMap<String, NodeId>,
    type_names: Vec<String>,
    type_name_to_id: HashMap<String, NodeTypeT>,
    partite: PartiteStructure,
    block_counter: u64,
    pub sampler: Sampler,
}

impl Network {
    pub fn new(type_names: Vec<String>, seed: u64) -> Self {
        let type_name_to_id = type_names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx as NodeTypeT))
            .collect();
        Self {
            nodes: Vec::new(),
            levels: vec![HashMap::new()],
            id_index: HashMap::new(),
            type_names,
            type_name_to_id,
            partite: PartiteStructure::Unipartite,
            block_counter: 0,
            sampler: Sampler::new(seed),
        }
    }

    pub fn with_restricted_types(
        type_names: Vec<String>,
        allowed_pairs: &[(String, String)],
        seed: u64,
    ) -> Result<Self> {
        let mut net = Self::new(type_names, seed);
        let mut pairs = HashSet::new();
        for (a, b) in allowed_pairs {
            let ta = net.type_id(a)?;
            let tb = net.type_id(b)?;
            pairs.insert(OrderedPair::new(ta, tb));
        }
        net.partite = PartiteStructure::MultipartiteRestricted(pairs);
        Ok(net)
    }

    pub fn set_multipartite(&mut self) {
        if matches!(self.partite, PartiteStructure::Unipartite) {
            self.partite = PartiteStructure::Multipartite;
        }
    }

    fn type_id(&self, name: &str) -> Result<NodeTypeT> {
        self.type_name_to_id
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::UnknownType(name.to_string()))
    }

    fn type_name(&self, type_id: NodeTypeT) -> &str {
        &self.type_names[type_id as usize]
    }

    #[inline(always)]
    fn top_level(&self) -> LevelT {
        (self.levels.len() - 1) as LevelT
    }

    fn ensure_level_exists(&self, level: LevelT) -> Result<()> {
        if level as usize >= self.levels.len() {
            return Err(EngineError::LevelOutOfRange {
                requested: level as i64,
                top: self.top_level() as i64,
            });
        }
        Ok(())
    }

    #[inline(always)]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    #[inline(always)]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn get_node_by_id(&self, id: &str) -> Result<NodeId> {
        self.id_index
            .get(id)
            .copied()
            .ok_or_else(|| EngineError::NodeNotFound(id.to_string()))
    }

    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn n_nodes_at_level(&self, level: LevelT) -> Result<usize> {
        self.ensure_level_exists(level)?;
        Ok(self.levels[level as usize].values().map(Vec::len).sum())
    }

    pub fn n_nodes_of_type(&self, type_name: &str, level: LevelT) -> Result<usize> {
        self.ensure_level_exists(level)?;
        let t = self.type_id(type_name)?;
        Ok(self.levels[level as usize]
            .get(&t)
            .map(Vec::len)
            .unwrap_or(0))
    }

    pub fn block_counts(&self, level: LevelT) -> Result<HashMap<String, usize>> {
        self.ensure_level_exists(level)?;
        Ok(self.levels[level as usize]
            .iter()
            .map(|(t, nodes)| (self.type_name(*t).to_string(), nodes.len()))
            .collect())
    }

    fn nodes_of_type_at_mut(&mut self, level: LevelT, t: NodeTypeT) -> &mut Vec<NodeId> {
        self.levels[level as usize].entry(t).or_insert_with(Vec::new)
    }

    /// Insert a node into the level/type index, creating the entry if needed.
    fn register(&mut self, id: NodeId, level: LevelT, t: NodeTypeT) {
        self.nodes_of_type_at_mut(level, t).push(id);
    }

    pub fn add_node(&mut self, id: &str, type_name: &str, level: LevelT) -> Result<NodeId> {
        if level as usize > self.levels.len() {
            return Err(EngineError::LevelOutOfRange {
                requested: level as i64,
                top: self.top_level() as i64,
            });
        }
        let t = self.type_id(type_name)?;

        if level == 0 && self.id_index.contains_key(id) {
            return Err(EngineError::DuplicateNodeId(id.to_string()));
        }

        if level as usize == self.levels.len() {
            self.levels.push(HashMap::new());
        }

        let node_id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(id.to_string(), level, t));
        if level == 0 {
            self.id_index.insert(id.to_string(), node_id);
        }
        self.register(node_id, level, t);
        Ok(node_id)
    }

    fn next_block_id(&mut self) -> String {
        let id = format!("b_{}", self.block_counter);
        self.block_counter += 1;
        id
    }

    /// Create a fresh, childless block of `type_id` at `level`.
    fn new_block(&mut self, level: LevelT, type_id: NodeTypeT) -> NodeId {
        let id = self.next_block_id();
        let node_id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(id, level, type_id));
        self.register(node_id, level, type_id);
        node_id
    }

    fn validate_edge_types(&self, ta: NodeTypeT, tb: NodeTypeT) -> Result<()> {
        if let PartiteStructure::MultipartiteRestricted(allowed) = &self.partite {
            let pair = OrderedPair::new(ta, tb);
            if !allowed.contains(&pair) {
                return Err(EngineError::DisallowedEdgeType {
                    a: self.type_name(ta).to_string(),
                    b: self.type_name(tb).to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn add_edge(&mut self, a_id: &str, b_id: &str) -> Result<()> {
        let a = self.get_node_by_id(a_id)?;
        let b = self.get_node_by_id(b_id)?;
        self.validate_edge_types(self.node(a).node_type, self.node(b).node_type)?;

        self.node_mut(a).neighbors.push(b);
        self.node_mut(b).neighbors.push(a);

        self.bump_degree_chain(a, 1);
        self.bump_degree_chain(b, 1);
        Ok(())
    }

    pub fn add_edges(&mut self, edges: &[(String, String)]) -> Result<()> {
        for (a, b) in edges {
            self.add_edge(a, b)?;
        }
        Ok(())
    }

    fn bump_degree_chain(&mut self, mut node: NodeId, delta: i64) {
        loop {
            self.node_mut(node).adjust_degree(delta);
            match self.node(node).parent {
                Some(p) => node = p,
                None => break,
            }
        }
    }

    /// Re-parent `child` to `new_parent`. If this empties the old parent and
    /// `remove_empty` is set, the old parent is dropped from its type bucket.
    pub fn swap_blocks(&mut self, child: NodeId, new_parent: NodeId, remove_empty: bool) -> Result<()> {
        let old_parent = self.node(child).parent;
        let degree = self.node(child).degree();

        if let Some(old) = old_parent {
            self.node_mut(old).adjust_degree(-degree);
            self.node_mut(old).children.retain(|&c| c != child);
        }

        self.node_mut(new_parent).adjust_degree(degree);
        self.node_mut(new_parent).children.push(child);
        self.node_mut(child).parent = Some(new_parent);

        if let Some(old) = old_parent {
            if remove_empty && self.node(old).is_empty() {
                self.remove_block(old)?;
            }
        }
        Ok(())
    }

    fn remove_block(&mut self, block: NodeId) -> Result<()> {
        let level = self.node(block).level;
        let t = self.node(block).node_type;
        let bucket = self
            .levels
            .get_mut(level as usize)
            .and_then(|m| m.get_mut(&t))
            .ok_or_else(|| EngineError::MissingFromHolder(self.node(block).id.clone()))?;
        let before = bucket.len();
        bucket.retain(|&n| n != block);
        if bucket.len() == before {
            return Err(EngineError::MissingFromHolder(self.node(block).id.clone()));
        }
        self.node_mut(block).alive = false;
        Ok(())
    }

    /// Remove `block` if it currently has no children. Returns whether it was
    /// removed.
    pub fn remove_if_empty(&mut self, block: NodeId) -> Result<bool> {
        if self.node(block).is_empty() {
            self.remove_block(block)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Re-parent every child of `from` into `into`, then remove the now-empty
    /// `from` block. Used by the agglomerative merger.
    pub fn swap_all_children(&mut self, from: NodeId, into: NodeId) -> Result<()> {
        if from == into {
            return Ok(());
        }
        let children: Vec<NodeId> = self.node(from).children.clone();
        for child in children {
            self.swap_blocks(child, into, false)?;
        }
        self.remove_block(from)
    }

    /// Append a new, empty block level.
    pub fn build_level(&mut self) {
        self.levels.push(HashMap::new());
    }

    pub fn delete_block_level(&mut self) -> Result<()> {
        if self.levels.len() <= 1 {
            return Err(EngineError::CannotDeleteDataLevel);
        }
        let top = self.levels.pop().unwrap();
        for ids in top.values() {
            for &id in ids {
                self.node_mut(id).alive = false;
            }
        }
        let below = self.top_level();
        for ids in self.levels[below as usize].values().flatten().copied().collect::<Vec<_>>() {
            self.node_mut(ids).parent = None;
        }
        Ok(())
    }

    /// Strip every block level above `level` and assign each node at `level`
    /// its own singleton block, or `b` blocks per type if `b` is given.
    pub fn initialize_blocks(&mut self, level: LevelT, b: Option<usize>) -> Result<()> {
        while self.top_level() > level {
            self.delete_block_level()?;
        }
        self.build_level();
        let new_level = self.top_level();

        let types: Vec<NodeTypeT> = self.levels[level as usize].keys().copied().collect();
        for t in types {
            let mut members = self.levels[level as usize][&t].clone();
            self.sampler.shuffle(&mut members);

            match b {
                None => {
                    for child in members {
                        let block = self.new_block(new_level, t);
                        self.swap_blocks(child, block, false)?;
                    }
                }
                Some(b) => {
                    if b > members.len() {
                        return Err(EngineError::BlockCountTooLarge {
                            requested: b,
                            available: members.len(),
                            node_type: self.type_name(t).to_string(),
                        });
                    }
                    let blocks: Vec<NodeId> = (0..b).map(|_| self.new_block(new_level, t)).collect();
                    for (idx, child) in members.into_iter().enumerate() {
                        self.swap_blocks(child, blocks[idx % b], false)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Ensure every type at `level` has exactly one childless block,
    /// creating one if none exists.
    pub fn ensure_one_reserve_block(&mut self, level: LevelT) -> Result<()> {
        self.ensure_level_exists(level)?;
        let types: Vec<NodeTypeT> = self.levels[level as usize].keys().copied().collect();
        for t in types {
            let has_empty = self.levels[level as usize][&t]
                .iter()
                .any(|&n| self.node(n).is_empty());
            if !has_empty {
                self.new_block(level, t);
            }
        }
        Ok(())
    }

    pub fn nodes_at_level_of_type(&self, level: LevelT, t: NodeTypeT) -> &[NodeId] {
        self.levels
            .get(level as usize)
            .and_then(|m| m.get(&t))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn types(&self) -> &[String] {
        &self.type_names
    }

    /// Project `entity`'s level-0 descendant half-edges up to `level`,
    /// accumulating counts per ancestor block. `entity` may itself be a
    /// level-0 node (its own neighbor list is used directly) or a block at
    /// any level (every descendant leaf's neighbor list is used).
    pub fn gather_neighbors_at_level(&self, entity: NodeId, level: LevelT) -> NeighborCounts {
        let mut half_edges = Vec::new();
        self.collect_half_edges(entity, &mut half_edges);
        half_edges
            .into_iter()
            .filter_map(|neighbor| self.ancestor_at(neighbor, level))
            .counts()
            .into_iter()
            .map(|(ancestor, count)| (ancestor, count as i64))
            .collect()
    }

    /// Collect every level-0 half-edge belonging to `entity`'s descendants
    /// (or `entity` itself, if it is already a level-0 node).
    fn collect_half_edges(&self, entity: NodeId, out: &mut Vec<NodeId>) {
        let n = self.node(entity);
        if n.level == 0 {
            out.extend_from_slice(&n.neighbors);
        } else {
            for &child in &n.children {
                self.collect_half_edges(child, out);
            }
        }
    }

    /// Walk `node`'s parent chain up to `level`. Returns `None` if `level`
    /// exceeds the network's current top.
    pub fn ancestor_at(&self, node: NodeId, level: LevelT) -> Option<NodeId> {
        let mut cur = node;
        loop {
            let cur_level = self.node(cur).level;
            if cur_level == level {
                return Some(cur);
            }
            if cur_level > level {
                return None;
            }
            match self.node(cur).parent {
                Some(p) => cur = p,
                None => return None,
            }
        }
    }

    /// Build the full inter-block edge count map at `level` by scanning every
    /// level-0 edge and projecting both endpoints to their ancestor at
    /// `level`. A cross-block edge is visited from both of its endpoints'
    /// neighbor lists, so it's counted only from the lower-id endpoint;
    /// a same-block edge (both endpoints project to the same ancestor,
    /// including a literal self-loop) is counted from both, matching the
    /// doubled diagonal convention `OrderedPair::is_matching` callers expect.
    pub fn get_interblock_edge_counts(&self, level: LevelT) -> InterBlockEdgeCounts {
        let mut counts = InterBlockEdgeCounts::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.level != 0 || !node.alive {
                continue;
            }
            let a_id = NodeId(idx as u32);
            let a_block = match self.ancestor_at(a_id, level) {
                Some(b) => b,
                None => continue,
            };
            for &neighbor in &node.neighbors {
                let b_block = match self.ancestor_at(neighbor, level) {
                    Some(b) => b,
                    None => continue,
                };
                if a_block != b_block && neighbor.0 < a_id.0 {
                    continue;
                }
                let pair = OrderedPair::new(a_block, b_block);
                *counts.entry(pair).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Propose a candidate parent at `to_level` for `entity` (a level-0 node
    /// being moved, or a block being offered up for merging), biased toward
    /// well-connected blocks with ergodicity `eps`.
    ///
    /// With probability `eps * b_t / (d_neigh + eps * b_t)` the proposal is
    /// uniform over all same-type blocks at `to_level`; otherwise a random
    /// half-edge of `entity` is picked, raised to `to_level` to find block
    /// `r`, a random same-type half-edge of `r` is picked in turn, and *its*
    /// ancestor at `to_level` is returned. This two-hop walk is what biases
    /// the proposal toward blocks `entity` is actually well-connected to.
    pub fn propose_move(&mut self, entity: NodeId, to_level: LevelT, eps: f64) -> Option<NodeId> {
        let t = self.node(entity).node_type;
        let b_t = self.nodes_at_level_of_type(to_level, t).len();
        if b_t == 0 {
            return None;
        }
        let b_t = b_t as f64;
        let d_neigh = self.node_degree(entity) as f64;

        let use_uniform = d_neigh == 0.0
            || self.sampler.draw_unif() < (eps * b_t) / (d_neigh + eps * b_t);

        if use_uniform {
            let candidates = self.nodes_at_level_of_type(to_level, t).to_vec();
            return Some(*self.sampler.sample(&candidates));
        }

        let mut half_edges = Vec::new();
        self.collect_half_edges(entity, &mut half_edges);
        let w = *self.sampler.sample(&half_edges);
        let r = self.ancestor_at(w, to_level)?;

        let mut r_half_edges = Vec::new();
        self.collect_half_edges(r, &mut r_half_edges);
        let same_type_neighbors: Vec<NodeId> = r_half_edges
            .into_iter()
            .filter(|&n| self.node(n).node_type == t)
            .collect();

        if same_type_neighbors.is_empty() {
            let candidates = self.nodes_at_level_of_type(to_level, t).to_vec();
            return Some(*self.sampler.sample(&candidates));
        }
        let chosen = *self.sampler.sample(&same_type_neighbors);
        self.ancestor_at(chosen, to_level)
    }

    pub fn state(&self) -> StateDump {
        self.nodes
            .iter()
            .filter(|n| n.alive)
            .map(|n| StateRow {
                id: n.id.clone(),
                type_name: self.type_name(n.node_type).to_string(),
                parent_id: n.parent.map(|p| self.node(p).id.clone()),
                level: n.level,
            })
            .collect()
    }

    /// Rebuild every block level from a [`StateDump`], bottom-up. `dump` must
    /// include every non-data node currently alive plus every level-0 node
    /// (level-0 rows are ignored for reconstruction but validated for identity).
    pub fn update_state(&mut self, dump: &StateDump) -> Result<()> {
        while self.top_level() > 0 {
            self.delete_block_level()?;
        }

        let mut by_level: HashMap<LevelT, Vec<&StateRow>> = HashMap::new();
        for row in dump {
            if row.level > 0 {
                by_level.entry(row.level).or_insert_with(Vec::new).push(row);
            }
        }
        let mut levels: Vec<LevelT> = by_level.keys().copied().collect();
        levels.sort_unstable();

        for level in levels {
            self.build_level();
            for row in &by_level[&level] {
                let t = self.type_id(&row.type_name)?;
                let node_id = NodeId(self.nodes.len() as u32);
                self.nodes.push(Node::new(row.id.clone(), level, t));
                self.register(node_id, level, t);
            }
        }

        for row in dump {
            if row.level == 0 {
                continue;
            }
            let node_id = self.find_by_id_at_level(&row.id, row.level)?;
            if let Some(parent_id) = &row.parent_id {
                let parent = self.find_by_id_at_level(parent_id, row.level + 1)?;
                self.swap_blocks(node_id, parent, false)?;
            }
        }
        Ok(())
    }

    fn find_by_id_at_level(&self, id: &str, level: LevelT) -> Result<NodeId> {
        self.levels
            .get(level as usize)
            .into_iter()
            .flat_map(|m| m.values().flatten())
            .find(|&&n| self.node(n).id == id)
            .copied()
            .ok_or_else(|| EngineError::StateReferencesUnknownNode(id.to_string()))
    }

    pub fn node_degree(&self, node: NodeId) -> i64 {
        self.node(node).degree()
    }

    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    pub fn node_type_of(&self, node: NodeId) -> NodeTypeT {
        self.node(node).node_type
    }

    pub fn node_level_of(&self, node: NodeId) -> LevelT {
        self.node(node).level
    }

    pub fn node_id_string(&self, node: NodeId) -> &str {
        &self.node(node).id
    }

    pub fn node_children(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).children
    }

    /// Same-type sibling blocks at `node`'s own level, excluding `node` itself.
    pub fn sibling_candidates(&self, node: NodeId) -> Vec<NodeId> {
        let level = self.node(node).level;
        let t = self.node(node).node_type;
        self.nodes_at_level_of_type(level, t)
            .iter()
            .copied()
            .filter(|&n| n != node)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unipartite_with_edges(edges: &[(&str, &str)]) -> Network {
        let mut net = Network::new(vec!["a".to_string()], 1);
        let mut seen = HashSet::new();
        for (a, b) in edges {
            for id in [a, b] {
                if seen.insert(id.to_string()) {
                    net.add_node(id, "a", 0).unwrap();
                }
            }
        }
        for (a, b) in edges {
            net.add_edge(a, b).unwrap();
        }
        net
    }

    #[test]
    fn degree_matches_edge_count_with_self_loops() {
        let net = unipartite_with_edges(&[("n1", "n2"), ("n1", "n1")]);
        let n1 = net.get_node_by_id("n1").unwrap();
        // n1-n2 contributes 1, n1-n1 self loop contributes 2.
        assert_eq!(net.node_degree(n1), 3);
    }

    #[test]
    fn restricted_multipartite_rejects_disallowed_pair() {
        let mut net = Network::with_restricted_types(
            vec!["a".to_string(), "b".to_string()],
            &[("a".to_string(), "b".to_string())],
            1,
        )
        .unwrap();
        net.add_node("a1", "a", 0).unwrap();
        net.add_node("a2", "a", 0).unwrap();
        assert!(net.add_edge("a1", "a2").is_err());
    }

    #[test]
    fn interblock_edge_counts_weights_cross_and_same_block_pairs() {
        let mut net = unipartite_with_edges(&[("n1", "n2"), ("n3", "n4")]);
        net.add_edge("n1", "n3").unwrap();
        net.initialize_blocks(0, None).unwrap();

        let n1 = net.get_node_by_id("n1").unwrap();
        let n2 = net.get_node_by_id("n2").unwrap();
        let n3 = net.get_node_by_id("n3").unwrap();

        let block_a = net.parent_of(n1).unwrap();
        net.swap_blocks(n2, block_a, true).unwrap();
        let block_b = net.parent_of(n3).unwrap();

        let counts = net.get_interblock_edge_counts(1);
        // n1-n2 is a same-block edge: counted from both endpoints, so 2.
        assert_eq!(counts[&OrderedPair::new(block_a, block_a)], 2);
        // n1-n3 crosses blocks: counted once, not twice.
        assert_eq!(counts[&OrderedPair::new(block_a, block_b)], 1);
    }

    #[test]
    fn initialize_blocks_gives_one_block_per_node() {
        let mut net = unipartite_with_edges(&[("n1", "n2"), ("n2", "n3")]);
        net.initialize_blocks(0, None).unwrap();
        assert_eq!(net.n_nodes_at_level(1).unwrap(), 3);
    }

    #[test]
    fn state_roundtrip_is_identity() {
        let mut net = unipartite_with_edges(&[("n1", "n2"), ("n2", "n3"), ("n3", "n1")]);
        net.initialize_blocks(0, Some(2)).unwrap();
        let before = net.state();
        net.update_state(&before).unwrap();
        let after = net.state();
        assert_eq!(before.len(), after.len());
        for row in &before {
            assert!(after.contains(row));
        }
    }

    #[test]
    fn swap_to_own_parent_is_noop() {
        let mut net = unipartite_with_edges(&[("n1", "n2")]);
        net.initialize_blocks(0, None).unwrap();
        let n1 = net.get_node_by_id("n1").unwrap();
        let parent = net.parent_of(n1).unwrap();
        let degree_before = net.node_degree(parent);
        net.swap_blocks(n1, parent, true).unwrap();
        assert_eq!(net.node_degree(parent), degree_before);
    }
}
