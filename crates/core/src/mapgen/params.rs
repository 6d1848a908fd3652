//! Tunable constants for map generation and their validation.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::model::NodeKind;

/// Relative weights for the node kinds the type assigner may draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeWeights {
    pub monster: f64,
    pub elite: f64,
    pub event: f64,
    pub shop: f64,
    pub rest: f64,
}

impl TypeWeights {
    pub fn entries(&self) -> [(NodeKind, f64); 5] {
        [
            (NodeKind::Monster, self.monster),
            (NodeKind::Elite, self.elite),
            (NodeKind::Event, self.event),
            (NodeKind::Shop, self.shop),
            (NodeKind::Rest, self.rest),
        ]
    }

    fn total(&self) -> f64 {
        self.entries().iter().map(|(_, weight)| weight).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    pub levels: usize,
    pub max_per_row: usize,
    /// Width a row is merged down to before a rest row and after a full row.
    pub narrow_row_width: usize,
    /// Weights for starting with 1, 2 or 3 nodes.
    pub start_weights: [u32; 3],
    /// Weights for a node spawning 1, 2 or 3 children.
    pub child_weights: [u32; 3],
    pub type_probs: TypeWeights,
    pub early_probs: TypeWeights,
    /// Levels strictly below this draw from `early_probs`.
    pub early_level_cutoff: usize,
    /// Lowest level eligible for guaranteed elites and shops.
    pub special_min_level: usize,
    pub rest_rows: Vec<usize>,
    pub treasure_rows: Vec<usize>,
    pub rest_cap: usize,
    pub elite_extra_cap: usize,
    pub shop_extra_cap: usize,
    pub treasure_extra_cap: usize,
    pub guaranteed_elites: usize,
    pub guaranteed_shops: usize,
    pub branch_monster_threshold: usize,
    pub rest_boost_mon_run: f64,
    pub rest_boost_after_elite: f64,
    pub rest_boost_no_rest_amount: f64,
    pub rest_boost_no_rest_level: usize,
    pub rest_penalty_after_treasure: f64,
    pub enforce_monster_threshold: usize,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            levels: 17,
            max_per_row: 5,
            narrow_row_width: 3,
            start_weights: [10, 35, 55],
            child_weights: [60, 30, 10],
            type_probs: TypeWeights { monster: 37.0, elite: 10.0, event: 30.0, shop: 8.0, rest: 15.0 },
            early_probs: TypeWeights { monster: 50.0, elite: 0.0, event: 40.0, shop: 10.0, rest: 0.0 },
            early_level_cutoff: 4,
            special_min_level: 4,
            rest_rows: vec![5, 16],
            treasure_rows: vec![6],
            rest_cap: 5,
            elite_extra_cap: 5,
            shop_extra_cap: 3,
            treasure_extra_cap: 2,
            guaranteed_elites: 3,
            guaranteed_shops: 3,
            branch_monster_threshold: 3,
            rest_boost_mon_run: 0.5,
            rest_boost_after_elite: 0.5,
            rest_boost_no_rest_amount: 0.5,
            rest_boost_no_rest_level: 8,
            rest_penalty_after_treasure: 0.3,
            enforce_monster_threshold: 3,
        }
    }
}

impl ParameterSet {
    pub fn boss_level(&self) -> usize {
        self.levels - 1
    }

    pub fn is_rest_row(&self, level: usize) -> bool {
        self.rest_rows.contains(&level)
    }

    pub fn is_treasure_row(&self, level: usize) -> bool {
        self.treasure_rows.contains(&level)
    }

    /// Kind stamped on every node of `level`, if the level is fixed.
    pub fn forced_kind(&self, level: usize) -> Option<NodeKind> {
        if level == 0 {
            Some(NodeKind::Monster)
        } else if level == self.boss_level() {
            Some(NodeKind::Boss)
        } else if self.is_rest_row(level) {
            Some(NodeKind::Rest)
        } else if self.is_treasure_row(level) {
            Some(NodeKind::Treasure)
        } else {
            None
        }
    }

    pub fn weights_for_level(&self, level: usize) -> &TypeWeights {
        if level < self.early_level_cutoff { &self.early_probs } else { &self.type_probs }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.levels < 2 {
            return Err(ConfigError::TooFewLevels(self.levels));
        }
        if self.max_per_row < 2 {
            return Err(ConfigError::RowCapTooSmall(self.max_per_row));
        }
        if !(2..=self.max_per_row).contains(&self.narrow_row_width) {
            return Err(ConfigError::NarrowWidthOutOfRange {
                width: self.narrow_row_width,
                max_per_row: self.max_per_row,
            });
        }
        if self.start_weights.iter().all(|&weight| weight == 0) {
            return Err(ConfigError::EmptyWeights("start_weights"));
        }
        if self.child_weights.iter().all(|&weight| weight == 0) {
            return Err(ConfigError::EmptyWeights("child_weights"));
        }
        validate_weights("type_probs", &self.type_probs)?;
        validate_weights("early_probs", &self.early_probs)?;

        for (name, value) in [
            ("rest_boost_mon_run", self.rest_boost_mon_run),
            ("rest_boost_after_elite", self.rest_boost_after_elite),
            ("rest_boost_no_rest_amount", self.rest_boost_no_rest_amount),
            ("rest_penalty_after_treasure", self.rest_penalty_after_treasure),
        ] {
            check_scalar(name, value)?;
        }

        let last = self.boss_level();
        for (kind, rows) in [("rest", &self.rest_rows), ("treasure", &self.treasure_rows)] {
            if let Some(&level) = rows.iter().find(|&&level| level == 0 || level > last) {
                return Err(ConfigError::RowOutOfRange { kind, level, last });
            }
        }
        if let Some(&level) = self.rest_rows.iter().find(|level| self.treasure_rows.contains(level))
        {
            return Err(ConfigError::ConflictingForcedRow(level));
        }

        let mut rest_rows = self.rest_rows.clone();
        rest_rows.sort_unstable();
        rest_rows.dedup();
        if let Some(pair) = rest_rows.windows(2).find(|pair| pair[1] == pair[0] + 1) {
            return Err(ConfigError::AdjacentRestRows(pair[0], pair[1]));
        }

        if self.enforce_monster_threshold == 0 {
            return Err(ConfigError::ZeroMonsterThreshold);
        }
        Ok(())
    }
}

/// Canonical tuning constants.
pub fn get_default_params() -> ParameterSet {
    ParameterSet::default()
}

fn validate_weights(name: &'static str, weights: &TypeWeights) -> Result<(), ConfigError> {
    for (_, weight) in weights.entries() {
        check_scalar(name, weight)?;
    }
    if weights.total() <= 0.0 {
        return Err(ConfigError::EmptyWeights(name));
    }
    Ok(())
}

fn check_scalar(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidScalar { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        assert_eq!(get_default_params().validate(), Ok(()));
    }

    #[test]
    fn rejects_single_level_maps() {
        let params = ParameterSet { levels: 1, ..ParameterSet::default() };
        assert_eq!(params.validate(), Err(ConfigError::TooFewLevels(1)));
    }

    #[test]
    fn rejects_forced_rows_past_the_boss_level() {
        let params = ParameterSet { treasure_rows: vec![17], ..ParameterSet::default() };
        assert_eq!(
            params.validate(),
            Err(ConfigError::RowOutOfRange { kind: "treasure", level: 17, last: 16 })
        );
    }

    #[test]
    fn rejects_forced_rows_on_the_start_level() {
        let params = ParameterSet { rest_rows: vec![0], ..ParameterSet::default() };
        assert!(matches!(params.validate(), Err(ConfigError::RowOutOfRange { level: 0, .. })));
    }

    #[test]
    fn rejects_adjacent_rest_rows() {
        let params = ParameterSet { rest_rows: vec![9, 8], ..ParameterSet::default() };
        assert_eq!(params.validate(), Err(ConfigError::AdjacentRestRows(8, 9)));
    }

    #[test]
    fn rejects_level_that_is_both_rest_and_treasure() {
        let params =
            ParameterSet { rest_rows: vec![6], treasure_rows: vec![6], ..ParameterSet::default() };
        assert_eq!(params.validate(), Err(ConfigError::ConflictingForcedRow(6)));
    }

    #[test]
    fn rejects_narrow_width_above_row_cap() {
        let params = ParameterSet { max_per_row: 2, ..ParameterSet::default() };
        assert_eq!(
            params.validate(),
            Err(ConfigError::NarrowWidthOutOfRange { width: 3, max_per_row: 2 })
        );
    }

    #[test]
    fn rejects_negative_and_nan_scalars() {
        let params = ParameterSet { rest_boost_mon_run: -0.1, ..ParameterSet::default() };
        assert!(matches!(params.validate(), Err(ConfigError::InvalidScalar { .. })));

        let mut params = ParameterSet::default();
        params.type_probs.event = f64::NAN;
        assert!(matches!(params.validate(), Err(ConfigError::InvalidScalar { .. })));
    }

    #[test]
    fn rejects_all_zero_weight_tables() {
        let params = ParameterSet { start_weights: [0, 0, 0], ..ParameterSet::default() };
        assert_eq!(params.validate(), Err(ConfigError::EmptyWeights("start_weights")));

        let params = ParameterSet { early_probs: TypeWeights::default(), ..ParameterSet::default() };
        assert_eq!(params.validate(), Err(ConfigError::EmptyWeights("early_probs")));
    }

    #[test]
    fn boss_level_wins_over_forced_rows() {
        let params = ParameterSet::default();
        assert_eq!(params.forced_kind(16), Some(NodeKind::Boss));
        assert_eq!(params.forced_kind(5), Some(NodeKind::Rest));
        assert_eq!(params.forced_kind(6), Some(NodeKind::Treasure));
        assert_eq!(params.forced_kind(0), Some(NodeKind::Monster));
        assert_eq!(params.forced_kind(7), None);
    }

    #[test]
    fn partial_input_keeps_defaults() {
        let params: ParameterSet =
            serde_json::from_str(r#"{ "levels": 9, "rest_rows": [4] }"#).unwrap();
        assert_eq!(params.levels, 9);
        assert_eq!(params.rest_rows, vec![4]);
        assert_eq!(params.max_per_row, 5);
        assert_eq!(params.treasure_rows, vec![6]);
    }
}
