//! Pass ordering for one map: topology, kinds, density, then the width safety net.

use std::collections::HashSet;

use super::super::assign::assign_types;
use super::super::builder::build_graph;
use super::super::clamp::clamp_row_widths;
use super::super::density::enforce_monster_density;
use super::super::model::{MapGraph, NodeId, NodeKind};
use super::super::params::ParameterSet;
use super::super::seed::MapRng;
use super::GenerationReport;

pub(super) fn run(params: &ParameterSet, rng: &mut MapRng) -> (MapGraph, GenerationReport) {
    let mut graph = build_graph(params, rng);
    let mut placement = assign_types(&mut graph, params, rng);

    let protected: HashSet<NodeId> =
        placement.guaranteed_shops.iter().chain(&placement.relaxed_shops).copied().collect();
    let density_fixes =
        enforce_monster_density(&mut graph, params.enforce_monster_threshold, &protected);
    let safety_merges = clamp_row_widths(&mut graph, params, &mut placement);

    let report = GenerationReport {
        guaranteed_elites: surviving(&graph, &placement.guaranteed_elites, NodeKind::Elite),
        guaranteed_shops: surviving(&graph, &placement.guaranteed_shops, NodeKind::Shop),
        relaxed_elites: surviving(&graph, &placement.relaxed_elites, NodeKind::Elite),
        relaxed_shops: surviving(&graph, &placement.relaxed_shops, NodeKind::Shop),
        unmet_elites: placement.unmet_elites,
        unmet_shops: placement.unmet_shops,
        density_fixes,
        safety_merges,
    };
    log::debug!(
        "generated {} nodes over {} levels, fingerprint {:016x}",
        graph.node_count(),
        graph.level_count(),
        graph.fingerprint()
    );
    (graph, report)
}

/// Placed ids whose node still carries the placed kind after merging.
fn surviving(graph: &MapGraph, ids: &[NodeId], kind: NodeKind) -> Vec<NodeId> {
    let index = graph.index();
    ids.iter()
        .copied()
        .filter(|id| index.get(id).is_some_and(|&slot| graph.node_at(slot).kind == kind))
        .collect()
}
