pub mod error;
pub mod types;

pub use error::{EngineError, ErrorCode, ErrorFamily};
pub use types::{LevelT, NodeId, NodeT, NodeTypeT, ParamT, Result, WeightT};
