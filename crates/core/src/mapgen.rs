//! Procedural route-map generation split into one module per pass.

pub mod audit;
pub mod balance;
pub mod model;
pub mod params;

mod assign;
mod builder;
mod clamp;
mod density;
mod generator;
mod merge;
mod seed;

pub use audit::{Violation, audit};
pub use balance::{Balancer, Promotion, balance_choices, expected_values};
pub use generator::{GeneratedMap, GenerationReport, MapGenerator};
pub use model::{MapGraph, MapNode, NodeId, NodeKind, Slot};
pub use params::{ParameterSet, TypeWeights, get_default_params};
pub use seed::{MapRng, generate_runtime_seed};

use crate::error::ConfigError;

/// Validates `params` and builds one map. Without a seed a runtime seed is drawn and
/// recorded in the result so the map can be reproduced.
pub fn generate(seed: Option<u64>, params: &ParameterSet) -> Result<GeneratedMap, ConfigError> {
    let generator = MapGenerator::new(params.clone())?;
    let seed = seed.unwrap_or_else(generate_runtime_seed);
    log::debug!("generating map from seed {seed}");
    Ok(generator.generate(seed))
}
