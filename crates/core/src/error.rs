use std::io;

use thiserror::Error;

use crate::mapgen::NodeId;

/// Reasons a [`ParameterSet`](crate::mapgen::ParameterSet) is rejected before generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("levels must be at least 2 (start row and boss row), got {0}")]
    TooFewLevels(usize),
    #[error("max_per_row must be at least 2, got {0}")]
    RowCapTooSmall(usize),
    #[error("narrow_row_width must lie in [2, {max_per_row}], got {width}")]
    NarrowWidthOutOfRange { width: usize, max_per_row: usize },
    #[error("{0} weights must not all be zero")]
    EmptyWeights(&'static str),
    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidScalar { name: &'static str, value: f64 },
    #[error("{kind} row {level} is outside [1, {last}]")]
    RowOutOfRange { kind: &'static str, level: usize, last: usize },
    #[error("level {0} is configured as both a rest row and a treasure row")]
    ConflictingForcedRow(usize),
    #[error("rest rows {0} and {1} are adjacent")]
    AdjacentRestRows(usize, usize),
    #[error("enforce_monster_threshold must be at least 1")]
    ZeroMonsterThreshold,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgressError {
    #[error("node {0} does not exist in this map")]
    UnknownNode(NodeId),
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u32),
    #[error("snapshot is inconsistent: {0}")]
    Inconsistent(String),
}
