//! Tagged error taxonomy for the engine.
//!
//! Grouped into three families, matching the three classes of failure the
//! inference engine can hit: a broken precondition on the caller's part
//! (`Logic`), a missing lookup (`Range`), and a bookkeeping mismatch that
//! should never happen in correct use (`Invariant`).

use thiserror::Error;

/// Stable, matchable code for each [`EngineError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCode {
    DuplicateNodeId,
    UnknownType,
    LevelOutOfRange,
    BlockCountTooLarge,
    CannotDeleteDataLevel,
    DisallowedEdgeType,
    TargetCollapseTooSmall,
    NodeNotFound,
    TypeNotFound,
    StateReferencesUnknownNode,
    DegreeMismatch,
    MissingFromHolder,
}

/// Coarse family a code belongs to, used for triage by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFamily {
    /// A precondition the caller controls was violated.
    Logic,
    /// A lookup by id/level/type missed.
    Range,
    /// Internal bookkeeping is inconsistent; treat as a bug report.
    Invariant,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("node id `{0}` already exists at level 0")]
    DuplicateNodeId(String),

    #[error("type `{0}` was not declared for this network")]
    UnknownType(String),

    #[error("level {requested} does not exist (top level is {top})")]
    LevelOutOfRange { requested: i64, top: i64 },

    #[error("requested {requested} blocks of type `{node_type}` but only {available} nodes of that type exist")]
    BlockCountTooLarge {
        requested: usize,
        available: usize,
        node_type: String,
    },

    #[error("cannot delete the data level (level 0)")]
    CannotDeleteDataLevel,

    #[error("edge type pair (`{a}`, `{b}`) is not in the allowed multipartite whitelist")]
    DisallowedEdgeType { a: String, b: String },

    #[error("collapse target block count {b_end} is smaller than the number of declared types ({num_types})")]
    TargetCollapseTooSmall { b_end: usize, num_types: usize },

    #[error("no node with id `{0}` exists")]
    NodeNotFound(String),

    #[error("no type named `{0}` exists")]
    TypeNotFound(String),

    #[error("state dump references node id `{0}` which is not known to this network")]
    StateReferencesUnknownNode(String),

    #[error("degree bookkeeping mismatch for block `{block}`: cached {cached}, recomputed {recomputed}")]
    DegreeMismatch {
        block: String,
        cached: i64,
        recomputed: i64,
    },

    #[error("tried to remove node `{0}` from a holder it is not present in")]
    MissingFromHolder(String),
}

impl EngineError {
    /// Stable, matchable code for this error, independent of the rendered message.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateNodeId(_) => ErrorCode::DuplicateNodeId,
            Self::UnknownType(_) => ErrorCode::UnknownType,
            Self::LevelOutOfRange { .. } => ErrorCode::LevelOutOfRange,
            Self::BlockCountTooLarge { .. } => ErrorCode::BlockCountTooLarge,
            Self::CannotDeleteDataLevel => ErrorCode::CannotDeleteDataLevel,
            Self::DisallowedEdgeType { .. } => ErrorCode::DisallowedEdgeType,
            Self::TargetCollapseTooSmall { .. } => ErrorCode::TargetCollapseTooSmall,
            Self::NodeNotFound(_) => ErrorCode::NodeNotFound,
            Self::TypeNotFound(_) => ErrorCode::TypeNotFound,
            Self::StateReferencesUnknownNode(_) => ErrorCode::StateReferencesUnknownNode,
            Self::DegreeMismatch { .. } => ErrorCode::DegreeMismatch,
            Self::MissingFromHolder(_) => ErrorCode::MissingFromHolder,
        }
    }

    /// Which of the three error families this error belongs to.
    pub fn family(&self) -> ErrorFamily {
        match self {
            Self::DuplicateNodeId(_)
            | Self::UnknownType(_)
            | Self::BlockCountTooLarge { .. }
            | Self::CannotDeleteDataLevel
            | Self::DisallowedEdgeType { .. }
            | Self::TargetCollapseTooSmall { .. } => ErrorFamily::Logic,

            Self::LevelOutOfRange { .. }
            | Self::NodeNotFound(_)
            | Self::TypeNotFound(_)
            | Self::StateReferencesUnknownNode(_) => ErrorFamily::Range,

            Self::DegreeMismatch { .. } | Self::MissingFromHolder(_) => ErrorFamily::Invariant,
        }
    }
}
