//! Agglomerative block-pair merging: propose candidate merges, score them,
//! and perform the best ones.

use std::collections::HashMap;

use hsbm_types::{LevelT, NodeId};
use keyed_priority_queue::KeyedPriorityQueue;
use log::debug;

use crate::network::Network;
use crate::node::NeighborCounts;
use crate::ordered_pair::OrderedPair;

/// Total order wrapper over `f64` so merge-delta scores can key a
/// [`KeyedPriorityQueue`]. Merge deltas are always finite in practice; a NaN
/// would be a bug upstream, and `total_cmp` still gives a consistent (if
/// meaningless) ordering rather than panicking.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrdF64(f64);

impl Eq for OrdF64 {}
impl PartialOrd for OrdF64 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrdF64 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

fn ent(e: f64, d_u: f64, d_v: f64) -> f64 {
    if e <= 0.0 || d_u <= 0.0 || d_v <= 0.0 {
        0.0
    } else {
        e * (e / (d_u * d_v)).ln()
    }
}

fn accumulate_simple(net: &Network, counts: &NeighborCounts, self_key: NodeId, self_degree: f64) -> f64 {
    counts.iter().fold(0.0, |sum, (&t, &e)| {
        let scalar = if t == self_key { 2.0 } else { 1.0 };
        let t_degree = if t == self_key {
            self_degree
        } else {
            net.node_degree(t) as f64
        };
        sum + ent(e as f64, self_degree, t_degree) / scalar
    })
}

/// `Δ = post - pre`: positive means merging increases the description
/// length. The best merge is the most negative `Δ`.
pub fn merge_entropy_delta(net: &Network, a: NodeId, b: NodeId) -> f64 {
    let d_a = net.node_degree(a) as f64;
    let d_b = net.node_degree(b) as f64;
    let level = net.node_level_of(a);

    let a_counts = net.gather_neighbors_at_level(a, level);
    let b_counts = net.gather_neighbors_at_level(b, level);

    let pre = accumulate_simple(net, &a_counts, a, d_a) + accumulate_simple(net, &b_counts, b, d_b);

    let e_ab = *a_counts.get(&b).unwrap_or(&0);
    let self_a = *a_counts.get(&a).unwrap_or(&0);
    let self_b = *b_counts.get(&b).unwrap_or(&0);
    let merged_self = self_a + self_b + 2 * e_ab;

    let mut merged: NeighborCounts = HashMap::new();
    for (&t, &e) in a_counts.iter().chain(b_counts.iter()) {
        if t == a || t == b {
            continue;
        }
        *merged.entry(t).or_insert(0) += e;
    }
    if merged_self != 0 {
        merged.insert(a, merged_self);
    }

    let merged_degree = d_a + d_b;
    let post = accumulate_simple(net, &merged, a, merged_degree);

    post - pre
}

/// One proposed merge: `entropy_delta` is `Δ = post - pre` for merging
/// `merge_from` into `merge_into`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockMerger {
    pub entropy_delta: f64,
    pub merge_from: NodeId,
    pub merge_into: NodeId,
}

/// Propose up to `n_checks_per_block` candidate merge partners per block at
/// `level`, score every distinct candidate pair, and perform the
/// `n_merges` best (most entropy-reducing) merges that don't reuse an
/// already-merged block in the same round.
///
/// When `allow_exhaustive` is set and a type's candidate pool at `level` is
/// no larger than `n_checks_per_block`, every same-type pair is scored
/// directly instead of going through `propose_move` sampling — sampling
/// that many times from a pool that small would just revisit candidates.
pub fn agglomerative_merge(
    net: &mut Network,
    level: LevelT,
    n_merges: usize,
    n_checks_per_block: usize,
    eps: f64,
    allow_exhaustive: bool,
) -> Vec<BlockMerger> {
    let mut seen_pairs = std::collections::HashSet::new();
    let mut queue: KeyedPriorityQueue<OrderedPair<NodeId>, OrdF64> = KeyedPriorityQueue::new();

    for t in 0..net.types().len() as u16 {
        let pool = net.nodes_at_level_of_type(level, t).to_vec();
        if allow_exhaustive && pool.len() <= n_checks_per_block.max(1) {
            for i in 0..pool.len() {
                for j in (i + 1)..pool.len() {
                    let pair = OrderedPair::new(pool[i], pool[j]);
                    if !seen_pairs.insert(pair) {
                        continue;
                    }
                    let delta = merge_entropy_delta(net, pool[i], pool[j]);
                    queue.push(pair, OrdF64(-delta));
                }
            }
            continue;
        }

        for &block in &pool {
            for _ in 0..n_checks_per_block {
                let candidate = match net.propose_move(block, level, eps) {
                    Some(c) if c != block => c,
                    _ => continue,
                };
                let pair = OrderedPair::new(block, candidate);
                if !seen_pairs.insert(pair) {
                    continue;
                }
                let delta = merge_entropy_delta(net, block, candidate);
                queue.push(pair, OrdF64(-delta));
            }
        }
    }

    let mut merged_blocks = std::collections::HashSet::new();
    let mut performed = Vec::new();

    while performed.len() < n_merges {
        let (pair, OrdF64(neg_delta)) = match queue.pop() {
            Some(item) => item,
            None => break,
        };
        if merged_blocks.contains(&pair.first) || merged_blocks.contains(&pair.second) {
            continue;
        }
        let (merge_from, merge_into) = (pair.second, pair.first);
        debug!("merging {} into {} (delta {})", merge_from, merge_into, -neg_delta);

        if net.swap_all_children(merge_from, merge_into).is_err() {
            continue;
        }
        merged_blocks.insert(merge_from);
        merged_blocks.insert(merge_into);
        performed.push(BlockMerger {
            entropy_delta: -neg_delta,
            merge_from,
            merge_into,
        });
    }

    performed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_bipartite() -> Network {
        let mut net = Network::with_restricted_types(
            vec!["a".to_string(), "b".to_string()],
            &[("a".to_string(), "b".to_string())],
            5,
        )
        .unwrap();
        for id in ["a1", "a2", "a3", "a4"] {
            net.add_node(id, "a", 0).unwrap();
        }
        for id in ["b1", "b2", "b3", "b4"] {
            net.add_node(id, "b", 0).unwrap();
        }
        let edges = [
            ("a1", "b1"),
            ("a1", "b2"),
            ("a2", "b1"),
            ("a2", "b2"),
            ("a3", "b1"),
            ("a3", "b2"),
            ("a3", "b4"),
            ("a4", "b3"),
        ];
        for (a, b) in edges {
            net.add_edge(a, b).unwrap();
        }
        net
    }

    #[test]
    fn merging_reduces_block_count() {
        let mut net = tiny_bipartite();
        net.initialize_blocks(0, None).unwrap();
        let before = net.n_nodes_at_level(1).unwrap();
        let merges = agglomerative_merge(&mut net, 1, 2, 4, 0.1, false);
        assert!(!merges.is_empty());
        let after = net.n_nodes_at_level(1).unwrap();
        assert!(after < before);
    }

    #[test]
    fn exhaustive_fallback_reduces_block_count_on_small_pool() {
        let mut net = tiny_bipartite();
        net.initialize_blocks(0, None).unwrap();
        let before = net.n_nodes_at_level(1).unwrap();
        // n_checks_per_block (8) >= the 4-block-per-type pool, so every
        // same-type pair is enumerated directly instead of sampled.
        let merges = agglomerative_merge(&mut net, 1, 2, 8, 0.1, true);
        assert!(!merges.is_empty());
        let after = net.n_nodes_at_level(1).unwrap();
        assert!(after < before);
    }
}
