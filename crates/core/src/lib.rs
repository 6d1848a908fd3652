pub mod error;
pub mod mapgen;
pub mod progression;
pub mod snapshot;

pub use error::{ConfigError, ProgressError, SnapshotError};
pub use mapgen::{
    GeneratedMap, GenerationReport, MapGraph, MapNode, NodeId, NodeKind, ParameterSet,
    balance_choices, generate, get_default_params,
};
pub use progression::MapProgress;
pub use snapshot::MapSnapshot;
