//! Node-kind assignment: fixed rows, weighted draws, guaranteed specials and caps.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::model::{MapGraph, MapNode, NodeId, NodeKind, Slot};
use super::params::ParameterSet;
use super::seed::MapRng;

/// Which nodes later passes must treat as fixed or guaranteed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Placement {
    pub(crate) fixed: HashSet<NodeId>,
    pub(crate) guaranteed_elites: Vec<NodeId>,
    pub(crate) guaranteed_shops: Vec<NodeId>,
    /// Extra picks made after the disjoint-ancestry pass fell short.
    pub(crate) relaxed_elites: Vec<NodeId>,
    pub(crate) relaxed_shops: Vec<NodeId>,
    pub(crate) unmet_elites: usize,
    pub(crate) unmet_shops: usize,
}

pub(crate) fn assign_types(
    graph: &mut MapGraph,
    params: &ParameterSet,
    rng: &mut MapRng,
) -> Placement {
    let fixed = stamp_fixed_rows(graph, params);
    draw_kinds(graph, params, rng, &fixed);

    let ancestors = ancestor_sets(graph);
    let mut pass = GuaranteePass {
        graph: &mut *graph,
        params,
        rng: &mut *rng,
        ancestors: &ancestors,
        fixed: &fixed,
    };
    let elites = pass.place(NodeKind::Elite, params.guaranteed_elites, &[]);
    let reserved: Vec<NodeId> = elites.strict.iter().chain(&elites.relaxed).copied().collect();
    let shops = pass.place(NodeKind::Shop, params.guaranteed_shops, &reserved);

    let placement = Placement {
        fixed,
        guaranteed_elites: elites.strict,
        guaranteed_shops: shops.strict,
        relaxed_elites: elites.relaxed,
        relaxed_shops: shops.relaxed,
        unmet_elites: elites.unmet,
        unmet_shops: shops.unmet,
    };
    enforce_caps(graph, params, rng, &placement);
    placement
}

fn stamp_fixed_rows(graph: &mut MapGraph, params: &ParameterSet) -> HashSet<NodeId> {
    let mut fixed = HashSet::new();
    for (level, row) in graph.rows_mut().iter_mut().enumerate() {
        let Some(kind) = params.forced_kind(level) else {
            continue;
        };
        for node in row {
            node.kind = kind;
            fixed.insert(node.id);
        }
    }
    fixed
}

/// Per-node facts about the path above it, folded forward as kinds are settled.
#[derive(Default)]
struct Lineage {
    monster_run: HashMap<NodeId, usize>,
    under_rest: HashMap<NodeId, bool>,
}

impl Lineage {
    fn record(&mut self, node: &MapNode) {
        let run = if node.kind == NodeKind::Monster {
            1 + self.longest_monster_run(&node.parents)
        } else {
            0
        };
        self.monster_run.insert(node.id, run);
        let under_rest = node.kind == NodeKind::Rest || self.has_rest_ancestor(&node.parents);
        self.under_rest.insert(node.id, under_rest);
    }

    fn longest_monster_run(&self, parents: &BTreeSet<NodeId>) -> usize {
        parents.iter().filter_map(|parent| self.monster_run.get(parent)).copied().max().unwrap_or(0)
    }

    fn has_rest_ancestor(&self, parents: &BTreeSet<NodeId>) -> bool {
        parents.iter().any(|parent| self.under_rest.get(parent).copied().unwrap_or(false))
    }
}

fn draw_kinds(
    graph: &mut MapGraph,
    params: &ParameterSet,
    rng: &mut MapRng,
    fixed: &HashSet<NodeId>,
) {
    let index = graph.index();
    let mut lineage = Lineage::default();

    for level in 0..graph.level_count() {
        for position in 0..graph.row(level).len() {
            let slot = Slot { level, position };
            if !fixed.contains(&graph.node_at(slot).id) {
                let kind = draw_kind(graph, params, rng, &index, &lineage, graph.node_at(slot));
                graph.node_mut(slot).kind = kind;
            }
            lineage.record(graph.node_at(slot));
        }
    }
}

fn draw_kind(
    graph: &MapGraph,
    params: &ParameterSet,
    rng: &mut MapRng,
    index: &HashMap<NodeId, Slot>,
    lineage: &Lineage,
    node: &MapNode,
) -> NodeKind {
    let level = node.level;
    let parent_kinds: Vec<NodeKind> = node
        .parents
        .iter()
        .filter_map(|parent| index.get(parent))
        .map(|&slot| graph.node_at(slot).kind)
        .collect();
    let rest_adjacent = level
        .checked_sub(1)
        .is_some_and(|above| row_has_kind(graph, above, NodeKind::Rest))
        || row_has_kind(graph, level + 1, NodeKind::Rest);

    let mut rest_factor = 1.0;
    if lineage.longest_monster_run(&node.parents) >= params.branch_monster_threshold {
        rest_factor *= 1.0 + params.rest_boost_mon_run;
    }
    if parent_kinds.contains(&NodeKind::Elite) {
        rest_factor *= 1.0 + params.rest_boost_after_elite;
    }
    if level >= params.rest_boost_no_rest_level && !lineage.has_rest_ancestor(&node.parents) {
        rest_factor *= 1.0 + params.rest_boost_no_rest_amount;
    }
    if parent_kinds.contains(&NodeKind::Treasure) {
        rest_factor *= params.rest_penalty_after_treasure;
    }

    let candidates: Vec<(NodeKind, f64)> = params
        .weights_for_level(level)
        .entries()
        .into_iter()
        .filter(|&(kind, weight)| {
            weight > 0.0
                && match kind {
                    NodeKind::Rest => !rest_adjacent && !parent_kinds.contains(&NodeKind::Rest),
                    NodeKind::Elite => !parent_kinds.contains(&NodeKind::Elite),
                    _ => true,
                }
        })
        .map(|(kind, weight)| {
            (kind, if kind == NodeKind::Rest { weight * rest_factor } else { weight })
        })
        .collect();

    let weights: Vec<f64> = candidates.iter().map(|&(_, weight)| weight).collect();
    rng.weighted_index(&weights).map_or(NodeKind::Monster, |picked| candidates[picked].0)
}

fn row_has_kind(graph: &MapGraph, level: usize, kind: NodeKind) -> bool {
    graph.row(level).iter().any(|node| node.kind == kind)
}

/// Strict ancestors of every node.
pub(crate) fn ancestor_sets(graph: &MapGraph) -> HashMap<NodeId, BTreeSet<NodeId>> {
    let mut ancestors: HashMap<NodeId, BTreeSet<NodeId>> = HashMap::new();
    for node in graph.nodes() {
        let mut above = BTreeSet::new();
        for parent in &node.parents {
            above.insert(*parent);
            if let Some(grand) = ancestors.get(parent) {
                above.extend(grand.iter().copied());
            }
        }
        ancestors.insert(node.id, above);
    }
    ancestors
}

struct GuaranteePass<'a> {
    graph: &'a mut MapGraph,
    params: &'a ParameterSet,
    rng: &'a mut MapRng,
    ancestors: &'a HashMap<NodeId, BTreeSet<NodeId>>,
    fixed: &'a HashSet<NodeId>,
}

/// Outcome of one guarantee pass for a single kind.
#[derive(Debug, Default)]
struct Picks {
    /// Picks on distinct levels with pairwise disjoint ancestry.
    strict: Vec<NodeId>,
    /// Fill-ins for the strict shortfall that only avoid sharing a lineage.
    relaxed: Vec<NodeId>,
    /// How many strict picks are missing.
    unmet: usize,
}

impl GuaranteePass<'_> {
    /// Places up to `wanted` nodes of `kind`. Only strict picks count toward the guarantee.
    fn place(&mut self, kind: NodeKind, wanted: usize, reserved: &[NodeId]) -> Picks {
        if wanted == 0 {
            return Picks::default();
        }
        let index = self.graph.index();
        let children = self.graph.children();
        let last_eligible = self.params.levels.saturating_sub(2);

        let mut candidates: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|node| (self.params.special_min_level..=last_eligible).contains(&node.level))
            .filter(|node| !node.kind.is_locked())
            .filter(|node| !self.fixed.contains(&node.id) && !reserved.contains(&node.id))
            .map(|node| node.id)
            .collect();
        self.rng.shuffle(&mut candidates);

        let mut picks = Picks::default();
        let mut placed: Vec<NodeId> = Vec::new();
        for strict in [true, false] {
            for &candidate in &candidates {
                if placed.len() >= wanted {
                    break;
                }
                if placed.contains(&candidate)
                    || !self.fits(candidate, &placed, strict, kind, &index, &children)
                {
                    continue;
                }
                self.graph.node_mut(index[&candidate]).kind = kind;
                placed.push(candidate);
                if strict {
                    picks.strict.push(candidate);
                } else {
                    picks.relaxed.push(candidate);
                }
            }
            if strict {
                picks.unmet = wanted - picks.strict.len();
            }
        }

        if picks.unmet > 0 {
            log::warn!(
                "placed {} of {wanted} guaranteed {kind:?} nodes with disjoint ancestry from {} candidates; {} more share a lineage",
                picks.strict.len(),
                candidates.len(),
                picks.relaxed.len()
            );
        }
        picks
    }

    fn fits(
        &self,
        candidate: NodeId,
        placed: &[NodeId],
        strict: bool,
        kind: NodeKind,
        index: &HashMap<NodeId, Slot>,
        children: &HashMap<NodeId, Vec<NodeId>>,
    ) -> bool {
        let slot = index[&candidate];
        if placed.iter().any(|other| index[other].level == slot.level) {
            return false;
        }
        if kind == NodeKind::Elite {
            let node = self.graph.node_at(slot);
            let neighbours = node.parents.iter().chain(children[&candidate].iter());
            if neighbours
                .filter_map(|id| index.get(id))
                .any(|&neighbour| self.graph.node_at(neighbour).kind == NodeKind::Elite)
            {
                return false;
            }
        }

        let mine = &self.ancestors[&candidate];
        placed.iter().all(|other| {
            let theirs = &self.ancestors[other];
            if strict {
                mine.is_disjoint(theirs)
            } else {
                !mine.contains(other) && !theirs.contains(&candidate)
            }
        })
    }
}

fn enforce_caps(
    graph: &mut MapGraph,
    params: &ParameterSet,
    rng: &mut MapRng,
    placement: &Placement,
) {
    let elites: HashSet<NodeId> = placement.guaranteed_elites.iter().copied().collect();
    let shops: HashSet<NodeId> = placement.guaranteed_shops.iter().copied().collect();
    let none = Vec::new();
    let caps = [
        (NodeKind::Rest, params.rest_cap, &placement.fixed, &none),
        (NodeKind::Elite, params.elite_extra_cap, &elites, &placement.relaxed_elites),
        (NodeKind::Shop, params.shop_extra_cap, &shops, &placement.relaxed_shops),
    ];
    for (kind, cap, exempt, kept_last) in caps {
        let mut extras: Vec<Slot> = Vec::new();
        for (level, row) in graph.rows().iter().enumerate() {
            for (position, node) in row.iter().enumerate() {
                if node.kind == kind && !exempt.contains(&node.id) {
                    extras.push(Slot { level, position });
                }
            }
        }
        if extras.len() <= cap {
            continue;
        }
        rng.shuffle(&mut extras);
        // Relaxed picks are extras too, but go only after the drawn ones.
        extras.sort_by_key(|&slot| kept_last.contains(&graph.node_at(slot).id));
        let excess = extras.len() - cap;
        log::debug!("downgrading {excess} extra {kind:?} nodes to monsters");
        for &slot in &extras[..excess] {
            graph.node_mut(slot).kind = NodeKind::Monster;
        }
    }
}
