//! Level-by-level construction of the layered encounter graph.

use std::collections::BTreeSet;

use super::merge::{merge_down_to, pad_row, probabilistic_merge};
use super::model::{MapGraph, MapNode, NodeKind};
use super::params::ParameterSet;
use super::seed::MapRng;

/// Builds the untyped topology: start row, growth rows, forced rows and the boss row.
pub(crate) fn build_graph(params: &ParameterSet, rng: &mut MapRng) -> MapGraph {
    let mut graph = MapGraph::new();

    let start_count = 1 + draw_triple(rng, params.start_weights);
    let start_row = (0..start_count)
        .map(|_| MapNode::new(graph.ids_mut().allocate(), 0, BTreeSet::new(), NodeKind::Monster))
        .collect();
    graph.push_row(start_row);

    for level in 1..params.levels {
        let previous = graph.row(level - 1).to_vec();
        let row = if level == params.boss_level() {
            boss_row(&mut graph, level, &previous)
        } else if params.is_rest_row(level) {
            forced_row(&mut graph, level, &previous, NodeKind::Rest, params.narrow_row_width)
        } else if params.is_treasure_row(level) {
            forced_row(&mut graph, level, &previous, NodeKind::Treasure, params.max_per_row)
        } else {
            growth_row(&mut graph, level, &previous, params, rng)
        };
        log::trace!("level {level}: {} nodes", row.len());
        graph.push_row(row);
    }

    log::debug!("built {} levels with {} nodes", graph.level_count(), graph.node_count());
    graph
}

fn boss_row(graph: &mut MapGraph, level: usize, previous: &[MapNode]) -> Vec<MapNode> {
    let parents = previous.iter().map(|node| node.id).collect();
    vec![MapNode::new(graph.ids_mut().allocate(), level, parents, NodeKind::Boss)]
}

fn forced_row(
    graph: &mut MapGraph,
    level: usize,
    previous: &[MapNode],
    kind: NodeKind,
    cap: usize,
) -> Vec<MapNode> {
    let ids = graph.ids_mut();
    let mut row: Vec<MapNode> = previous
        .iter()
        .map(|parent| MapNode::new(ids.allocate(), level, BTreeSet::from([parent.id]), kind))
        .collect();
    if row.len() > cap {
        merge_down_to(&mut row, cap, ids);
    }
    pad_row(&mut row, ids);
    row
}

fn growth_row(
    graph: &mut MapGraph,
    level: usize,
    previous: &[MapNode],
    params: &ParameterSet,
    rng: &mut MapRng,
) -> Vec<MapNode> {
    let ids = graph.ids_mut();
    let mut row = Vec::new();
    for parent in previous {
        let children = 1 + draw_triple(rng, params.child_weights);
        for _ in 0..children {
            let parents = BTreeSet::from([parent.id]);
            row.push(MapNode::new(ids.allocate(), level, parents, NodeKind::Unassigned));
        }
    }

    let narrow = params.narrow_row_width;
    if params.is_rest_row(level + 1) && row.len() > narrow {
        merge_down_to(&mut row, narrow, ids);
    }
    // Independent of the rule above; a row may satisfy both.
    if previous.len() == params.max_per_row && row.len() > narrow {
        merge_down_to(&mut row, narrow, ids);
    }

    probabilistic_merge(&mut row, merge_chance(previous.len(), params.max_per_row), rng, ids);

    if row.len() > params.max_per_row {
        merge_down_to(&mut row, params.max_per_row, ids);
    }
    pad_row(&mut row, ids);
    row
}

fn merge_chance(previous_width: usize, max_per_row: usize) -> f64 {
    if previous_width >= max_per_row || previous_width >= 4 {
        0.3
    } else if previous_width >= 3 {
        0.2
    } else {
        0.0
    }
}

/// Zero-based index drawn from a three-way weight table.
fn draw_triple(rng: &mut MapRng, weights: [u32; 3]) -> usize {
    let weights = weights.map(f64::from);
    rng.weighted_index(&weights).unwrap_or(0)
}
