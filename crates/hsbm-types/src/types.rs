//! Core numeric and identifier types shared across the engine.

/// Type used to index nodes within a single level/type bucket.
pub type NodeT = u32;
/// Type used to index node types.
pub type NodeTypeT = u16;
/// Type used to index block levels.
pub type LevelT = u16;
/// Type used for raw edge multiplicities.
pub type EdgeT = u32;
/// Type used for entropy and probability computations.
pub type WeightT = f64;
/// Ergodicity mixing parameter (eps) and the geometric collapse rate (sigma).
pub type ParamT = f64;

/// Stable arena index for a [`Node`](crate) across the lifetime of a network.
///
/// Indices are never reused while a node is alive: deleted slots are left as
/// tombstones rather than recycled, so a stale `NodeId` captured before a
/// deletion will always fail lookup instead of silently resolving to an
/// unrelated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel reserved for "no parent" / "not present" slots.
    pub const NONE: NodeId = NodeId(u32::MAX);

    #[inline(always)]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = core::result::Result<T, crate::error::EngineError>;
