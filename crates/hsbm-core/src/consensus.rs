//! Across-sweep co-membership tracking for every eligible pair of data-level
//! nodes.

use std::collections::{HashMap, HashSet};

use hsbm_types::NodeId;

use crate::network::Network;

/// Co-membership status for one node pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairStatus {
    pub connected: bool,
    pub times_connected: u32,
}

/// `"smaller_id--larger_id"`, alphabetically ordered so the key is the same
/// regardless of argument order.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}--{b}")
    } else {
        format!("{b}--{a}")
    }
}

/// Accumulates, across sweeps, how often every eligible pair of data-level
/// nodes sits in the same block.
#[derive(Debug, Default)]
pub struct BlockConsensus {
    pairs: HashMap<String, PairStatus>,
}

impl BlockConsensus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, a: &str, b: &str) -> PairStatus {
        self.pairs.get(&pair_key(a, b)).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Seed one entry per pair of same-type level-0 nodes. Cross-type pairs
    /// are excluded because a multipartite graph never places them in the
    /// same block. A pair already sharing a parent seeds `connected: true`.
    pub fn initialize(&mut self, net: &Network) {
        self.pairs.clear();
        for (type_idx, _) in net.types().iter().enumerate() {
            let members = net.nodes_at_level_of_type(0, type_idx as u16);
            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    let a = net.node_id_string(members[i]);
                    let b = net.node_id_string(members[j]);
                    let connected = net.parent_of(members[i]) == net.parent_of(members[j]);
                    self.pairs.insert(
                        pair_key(a, b),
                        PairStatus {
                            connected,
                            times_connected: 0,
                        },
                    );
                }
            }
        }
    }

    /// Toggle `connected` on every key in `changed_keys`, then increment
    /// `times_connected` on every pair whose resulting status is connected.
    pub fn update(&mut self, changed_keys: &HashSet<String>) {
        for key in changed_keys {
            if let Some(status) = self.pairs.get_mut(key) {
                status.connected = !status.connected;
            }
        }
        for status in self.pairs.values_mut() {
            if status.connected {
                status.times_connected += 1;
            }
        }
    }
}

/// Pair keys whose co-membership may have flipped because `node` moved
/// between `old_block` and `new_block`: every other level-0 descendant of
/// either block, paired with `node`.
pub fn affected_pair_keys(
    net: &Network,
    node: NodeId,
    old_block: NodeId,
    new_block: NodeId,
) -> HashSet<String> {
    let node_id = net.node_id_string(node).to_string();
    let mut keys = HashSet::new();
    for sibling_holder in [old_block, new_block] {
        for &child in net.node_children(sibling_holder) {
            if child == node {
                continue;
            }
            keys.insert(pair_key(&node_id, net.node_id_string(child)));
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_is_order_independent() {
        assert_eq!(pair_key("n1", "n2"), pair_key("n2", "n1"));
    }

    #[test]
    fn initialize_excludes_cross_type_pairs() {
        let mut net = Network::with_restricted_types(
            vec!["a".to_string(), "b".to_string()],
            &[("a".to_string(), "b".to_string())],
            1,
        )
        .unwrap();
        net.add_node("a1", "a", 0).unwrap();
        net.add_node("a2", "a", 0).unwrap();
        net.add_node("b1", "b", 0).unwrap();

        let mut consensus = BlockConsensus::new();
        consensus.initialize(&net);

        assert_eq!(consensus.len(), 1);
        assert_eq!(consensus.get("a1", "b1"), PairStatus::default());
    }

    #[test]
    fn always_connected_pair_accumulates_every_sweep() {
        let mut consensus = BlockConsensus::new();
        consensus.pairs.insert("n1--n2".to_string(), PairStatus::default());
        let changed = HashSet::from(["n1--n2".to_string()]);
        consensus.update(&changed);
        for _ in 0..4 {
            consensus.update(&HashSet::new());
        }
        assert_eq!(consensus.get("n1", "n2").times_connected, 5);
    }

    #[test]
    fn initialize_seeds_connected_true_for_co_located_pairs() {
        let mut net = Network::new(vec!["a".to_string()], 1);
        net.add_node("a1", "a", 0).unwrap();
        net.add_node("a2", "a", 0).unwrap();
        net.initialize_blocks(0, Some(1)).unwrap();

        let mut consensus = BlockConsensus::new();
        consensus.initialize(&net);

        assert!(consensus.get("a1", "a2").connected);
    }

    #[test]
    fn four_node_single_block_accumulates_five_after_five_sweeps_with_no_moves() {
        use crate::sweep::mcmc_sweep;

        let mut net = Network::new(vec!["a".to_string()], 1);
        for id in ["a1", "a2", "a3", "a4"] {
            net.add_node(id, "a", 0).unwrap();
        }
        net.initialize_blocks(0, Some(1)).unwrap();

        let mut consensus = BlockConsensus::new();
        consensus.initialize(&net);

        mcmc_sweep(&mut net, 0, 5, 0.1, false, true, Some(&mut consensus), &|| false).unwrap();

        let pairs = [("a1", "a2"), ("a1", "a3"), ("a1", "a4"), ("a2", "a3"), ("a2", "a4"), ("a3", "a4")];
        for (a, b) in pairs {
            assert_eq!(consensus.get(a, b).times_connected, 5, "pair ({a}, {b})");
        }
    }
}
