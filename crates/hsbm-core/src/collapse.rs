//! Drives the block count down from one-per-node to a target via repeated
//! agglomerative merging, optionally interleaved with MCMC sweeps.

use hsbm_types::{EngineError, LevelT, Result};
use log::debug;

use crate::merger::{agglomerative_merge, BlockMerger};
use crate::network::{Network, StateDump};
use crate::sweep::mcmc_sweep;

/// One stage of the collapse schedule.
#[derive(Debug, Clone)]
pub struct CollapseStage {
    pub merges: Vec<BlockMerger>,
    pub sweep_entropy_delta: f64,
    pub n_blocks_after: usize,
    pub state_after: Option<StateDump>,
}

/// Aggregate outcome of [`collapse_blocks`].
#[derive(Debug, Clone)]
pub struct CollapseResult {
    pub stages: Vec<CollapseStage>,
    pub total_entropy_delta: f64,
}

/// Collapse the block level directly above `node_level` from one block per
/// node down to `b_end` blocks, in stages whose size shrinks geometrically
/// by `sigma`.
#[allow(clippy::too_many_arguments)]
pub fn collapse_blocks(
    net: &mut Network,
    node_level: LevelT,
    b_end: usize,
    n_checks_per_block: usize,
    n_mcmc_sweeps: usize,
    sigma: f64,
    eps: f64,
    report_all_steps: bool,
    allow_exhaustive: bool,
) -> Result<CollapseResult> {
    let num_types = net.types().len();
    if b_end < num_types {
        return Err(EngineError::TargetCollapseTooSmall { b_end, num_types });
    }
    assert!(sigma > 1.0, "sigma must exceed 1 for the collapse schedule to shrink");

    net.initialize_blocks(node_level, None)?;
    let block_level = node_level + 1;

    let mut b_cur = net.n_nodes_at_level(block_level)?;
    let mut stages = Vec::new();
    let mut total_entropy_delta = 0.0;

    while b_cur > b_end {
        let decayed = ((b_cur as f64) / sigma).floor() as usize;
        let target = decayed.max(b_end);
        let n_merges = (b_cur - target).max(1);

        let merges = agglomerative_merge(
            net,
            block_level,
            n_merges,
            n_checks_per_block,
            eps,
            allow_exhaustive,
        );

        let mut sweep_entropy_delta = 0.0;
        if n_mcmc_sweeps > 0 {
            let sweeps = mcmc_sweep(
                net,
                node_level,
                n_mcmc_sweeps,
                eps,
                false,
                false,
                None,
                &|| false,
            )?;
            sweep_entropy_delta = sweeps.iter().map(|r| r.entropy_delta).sum();
            prune_empty_blocks(net, block_level)?;
        }

        b_cur = net.n_nodes_at_level(block_level)?;

        let stage_delta: f64 = merges.iter().map(|m| m.entropy_delta).sum::<f64>() + sweep_entropy_delta;
        total_entropy_delta += stage_delta;

        debug!("collapse stage: {} blocks remaining, delta {}", b_cur, stage_delta);

        stages.push(CollapseStage {
            merges,
            sweep_entropy_delta,
            n_blocks_after: b_cur,
            state_after: if report_all_steps {
                Some(net.state())
            } else {
                None
            },
        });
    }

    Ok(CollapseResult {
        stages,
        total_entropy_delta,
    })
}

fn prune_empty_blocks(net: &mut Network, level: LevelT) -> Result<()> {
    for t in 0..net.types().len() as u16 {
        let empties: Vec<_> = net
            .nodes_at_level_of_type(level, t)
            .iter()
            .copied()
            .filter(|&n| net.node_children(n).is_empty())
            .collect();
        for block in empties {
            net.remove_if_empty(block)?;
        }
    }
    Ok(())
}
