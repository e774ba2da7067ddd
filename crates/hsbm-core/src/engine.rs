//! Programmatic facade over [`Network`] exposing exactly the external
//! interface a host integration consumes: construction, mutation,
//! inspection, and inference.

use hsbm_types::{LevelT, Result};

use crate::collapse::{collapse_blocks, CollapseResult};
use crate::consensus::BlockConsensus;
use crate::network::{InterBlockEdgeCounts, Network, StateDump};
use crate::sweep::{mcmc_sweep, SweepResult};

/// A hierarchical degree-corrected SBM inference engine over a (possibly
/// multi-partite) graph of typed nodes.
pub struct Engine {
    net: Network,
    consensus: BlockConsensus,
}

impl Engine {
    /// An empty engine over the given declared type names.
    pub fn new(type_names: Vec<String>, seed: u64) -> Self {
        Self {
            net: Network::new(type_names, seed),
            consensus: BlockConsensus::new(),
        }
    }

    /// An engine restricted to the given allowed `(type_a, type_b)` edge
    /// pairs (a restricted-multipartite graph).
    pub fn with_restricted_types(
        type_names: Vec<String>,
        allowed_pairs: &[(String, String)],
        seed: u64,
    ) -> Result<Self> {
        Ok(Self {
            net: Network::with_restricted_types(type_names, allowed_pairs, seed)?,
            consensus: BlockConsensus::new(),
        })
    }

    pub fn add_node(&mut self, id: &str, type_name: &str, level: LevelT) -> Result<()> {
        self.net.add_node(id, type_name, level)?;
        Ok(())
    }

    pub fn add_edge(&mut self, a_id: &str, b_id: &str) -> Result<()> {
        self.net.add_edge(a_id, b_id)
    }

    pub fn add_edges(&mut self, edges: &[(String, String)]) -> Result<()> {
        self.net.add_edges(edges)
    }

    pub fn initialize_blocks(&mut self, level: LevelT, b: Option<usize>) -> Result<()> {
        self.net.initialize_blocks(level, b)
    }

    pub fn n_levels(&self) -> usize {
        self.net.n_levels()
    }

    pub fn n_nodes_at_level(&self, level: LevelT) -> Result<usize> {
        self.net.n_nodes_at_level(level)
    }

    pub fn block_counts(&self, level: LevelT) -> Result<std::collections::HashMap<String, usize>> {
        self.net.block_counts(level)
    }

    pub fn state(&self) -> StateDump {
        self.net.state()
    }

    pub fn get_interblock_edge_counts(&self, level: LevelT) -> InterBlockEdgeCounts {
        self.net.get_interblock_edge_counts(level)
    }

    pub fn update_state(&mut self, dump: &StateDump) -> Result<()> {
        self.net.update_state(dump)
    }

    pub fn network(&self) -> &Network {
        &self.net
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.net
    }

    /// Run `n_sweeps` MCMC sweeps at `level`. When `track_pairs` is set, the
    /// consensus tracker must already have been seeded via
    /// [`Engine::initialize_consensus`].
    #[allow(clippy::too_many_arguments)]
    pub fn mcmc_sweep(
        &mut self,
        level: LevelT,
        n_sweeps: usize,
        eps: f64,
        variable_num_blocks: bool,
        track_pairs: bool,
        should_stop: &dyn Fn() -> bool,
    ) -> Result<Vec<SweepResult>> {
        let consensus = if track_pairs {
            Some(&mut self.consensus)
        } else {
            None
        };
        mcmc_sweep(
            &mut self.net,
            level,
            n_sweeps,
            eps,
            variable_num_blocks,
            track_pairs,
            consensus,
            should_stop,
        )
    }

    pub fn initialize_consensus(&mut self) {
        self.consensus.initialize(&self.net);
    }

    pub fn consensus(&self) -> &BlockConsensus {
        &self.consensus
    }

    #[allow(clippy::too_many_arguments)]
    pub fn collapse_blocks(
        &mut self,
        node_level: LevelT,
        b_end: usize,
        n_checks_per_block: usize,
        n_mcmc_sweeps: usize,
        sigma: f64,
        eps: f64,
        report_all_steps: bool,
        allow_exhaustive: bool,
    ) -> Result<CollapseResult> {
        collapse_blocks(
            &mut self.net,
            node_level,
            b_end,
            n_checks_per_block,
            n_mcmc_sweeps,
            sigma,
            eps,
            report_all_steps,
            allow_exhaustive,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_collapse_then_sweep() {
        let mut engine = Engine::new(vec!["a".to_string()], 13);
        for id in ["n1", "n2", "n3", "n4", "n5", "n6"] {
            engine.add_node(id, "a", 0).unwrap();
        }
        let edges = [
            ("n1", "n2"),
            ("n1", "n3"),
            ("n2", "n3"),
            ("n4", "n5"),
            ("n4", "n6"),
            ("n5", "n6"),
        ];
        for (a, b) in edges {
            engine.add_edge(a, b).unwrap();
        }

        let result = engine
            .collapse_blocks(0, 2, 4, 0, 1.5, 0.1, true, false)
            .unwrap();
        assert!(!result.stages.is_empty());
        assert_eq!(engine.n_nodes_at_level(1).unwrap(), 2);

        engine.initialize_consensus();
        let sweeps = engine
            .mcmc_sweep(0, 3, 0.1, false, true, &|| false)
            .unwrap();
        assert_eq!(sweeps.len(), 3);

        let counts = engine.get_interblock_edge_counts(1);
        assert!(!counts.is_empty());
    }
}
