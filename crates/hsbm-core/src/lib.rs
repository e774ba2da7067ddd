//! Hierarchical degree-corrected stochastic block model inference engine.
//!
//! [`Engine`] is the intended entry point; the individual modules are public
//! for callers that need direct access to the entropy accounting or the
//! underlying [`Network`] arena.

pub mod collapse;
pub mod consensus;
pub mod engine;
pub mod merger;
pub mod move_results;
pub mod network;
pub mod node;
pub mod ordered_pair;
pub mod sampler;
pub mod sweep;

pub use collapse::{collapse_blocks, CollapseResult, CollapseStage};
pub use consensus::{BlockConsensus, PairStatus};
pub use engine::Engine;
pub use merger::{agglomerative_merge, BlockMerger};
pub use move_results::{compute_entropy, move_results, MoveResult};
pub use network::{InterBlockEdgeCounts, Network, PartiteStructure, StateDump, StateRow};
pub use node::Node;
pub use ordered_pair::OrderedPair;
pub use sampler::Sampler;
pub use sweep::{mcmc_sweep, SweepResult};

pub use hsbm_types::{EngineError, ErrorCode, ErrorFamily, LevelT, NodeId, NodeT, NodeTypeT, ParamT, Result, WeightT};
