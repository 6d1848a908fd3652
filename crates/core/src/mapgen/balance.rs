//! Optional second pass that narrows the per-row spread of expected downstream reward.

use std::collections::{HashMap, HashSet};

use super::model::{MapGraph, NodeId, NodeKind, Slot};
use super::params::ParameterSet;

/// Promotion targets, most preferred first.
const PROMOTION_ORDER: [NodeKind; 3] = [NodeKind::Shop, NodeKind::Elite, NodeKind::Treasure];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Promotion {
    pub node: NodeId,
    pub from: NodeKind,
    pub to: NodeKind,
}

/// Own value plus the mean expected value of the children, folded bottom-up.
pub fn expected_values(graph: &MapGraph) -> HashMap<NodeId, f64> {
    let children = graph.children();
    let mut expected = HashMap::with_capacity(graph.node_count());
    for level in (0..graph.level_count()).rev() {
        fold_level(graph, &children, &mut expected, level);
    }
    expected
}

fn fold_level(
    graph: &MapGraph,
    children: &HashMap<NodeId, Vec<NodeId>>,
    expected: &mut HashMap<NodeId, f64>,
    level: usize,
) {
    for node in graph.row(level) {
        let below = children.get(&node.id).map(Vec::as_slice).unwrap_or_default();
        let downstream = if below.is_empty() {
            0.0
        } else {
            below.iter().map(|child| expected.get(child).copied().unwrap_or(0.0)).sum::<f64>()
                / below.len() as f64
        };
        expected.insert(node.id, node.kind.value() + downstream);
    }
}

/// Remaining promotions each target kind may absorb before exceeding its cap.
struct Headroom {
    shops: usize,
    elites: usize,
    treasures: usize,
}

impl Headroom {
    fn measure(graph: &MapGraph, params: &ParameterSet) -> Self {
        let loose_treasures = graph
            .nodes()
            .filter(|node| node.kind == NodeKind::Treasure && !params.is_treasure_row(node.level))
            .count();
        Self {
            shops: (params.guaranteed_shops + params.shop_extra_cap)
                .saturating_sub(graph.count_kind(NodeKind::Shop)),
            elites: (params.guaranteed_elites + params.elite_extra_cap)
                .saturating_sub(graph.count_kind(NodeKind::Elite)),
            treasures: params.treasure_extra_cap.saturating_sub(loose_treasures),
        }
    }

    fn slot(&mut self, kind: NodeKind) -> Option<&mut usize> {
        match kind {
            NodeKind::Shop => Some(&mut self.shops),
            NodeKind::Elite => Some(&mut self.elites),
            NodeKind::Treasure => Some(&mut self.treasures),
            _ => None,
        }
    }

    fn has_room(&mut self, kind: NodeKind) -> bool {
        self.slot(kind).is_some_and(|room| *room > 0)
    }

    fn take(&mut self, kind: NodeKind) {
        if let Some(room) = self.slot(kind) {
            *room = room.saturating_sub(1);
        }
    }
}

pub struct Balancer<'a> {
    params: &'a ParameterSet,
    threshold: f64,
}

impl<'a> Balancer<'a> {
    pub fn new(params: &'a ParameterSet, threshold: f64) -> Self {
        Self { params, threshold }
    }

    /// Promotes the weakest node of every row whose spread exceeds the threshold, deepest
    /// rows first, until the spread closes or nothing eligible remains.
    pub fn apply(&self, graph: &mut MapGraph) -> Vec<Promotion> {
        if self.threshold.is_nan() {
            return Vec::new();
        }
        let index = graph.index();
        let children = graph.children();
        let mut expected = expected_values(graph);
        let mut headroom = Headroom::measure(graph, self.params);
        let mut promotions = Vec::new();

        for level in (0..graph.level_count()).rev() {
            let width = graph.row(level).len();
            if width < 2 || self.params.forced_kind(level).is_some() {
                continue;
            }
            let mut exhausted: HashSet<NodeId> = HashSet::new();
            // Promotions only raise a node's value along PROMOTION_ORDER, so each eligible
            // node is promoted at most once per target and exhausted at most once.
            let eligible = graph.row(level).iter().filter(|node| !node.kind.is_locked()).count();
            let rounds = eligible * (PROMOTION_ORDER.len() + 1);

            for _ in 0..rounds {
                if spread(graph, level, &expected) <= self.threshold {
                    break;
                }
                let Some(slot) = weakest(graph, level, &expected, &exhausted) else {
                    break;
                };
                let node = graph.node_at(slot);
                let Some(to) = self.target_for(graph, &index, &children, &mut headroom, slot)
                else {
                    exhausted.insert(node.id);
                    continue;
                };

                let promotion = Promotion { node: node.id, from: node.kind, to };
                log::trace!("level {level}: promoting {} from {:?} to {to:?}", node.id, node.kind);
                graph.node_mut(slot).kind = to;
                headroom.take(to);
                promotions.push(promotion);
                for refreshed in (0..=level).rev() {
                    fold_level(graph, &children, &mut expected, refreshed);
                }
            }
        }
        promotions
    }

    fn target_for(
        &self,
        graph: &MapGraph,
        index: &HashMap<NodeId, Slot>,
        children: &HashMap<NodeId, Vec<NodeId>>,
        headroom: &mut Headroom,
        slot: Slot,
    ) -> Option<NodeKind> {
        let node = graph.node_at(slot);
        PROMOTION_ORDER.into_iter().find(|&to| {
            if to.value() <= node.kind.value() || !headroom.has_room(to) {
                return false;
            }
            if to != NodeKind::Elite {
                return true;
            }
            let neighbours = node.parents.iter().chain(children[&node.id].iter());
            !neighbours
                .filter_map(|id| index.get(id))
                .any(|&neighbour| graph.node_at(neighbour).kind == NodeKind::Elite)
        })
    }
}

fn spread(graph: &MapGraph, level: usize, expected: &HashMap<NodeId, f64>) -> f64 {
    let values = graph.row(level).iter().map(|node| expected[&node.id]);
    let (low, high) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), value| {
        (low.min(value), high.max(value))
    });
    if high < low { 0.0 } else { high - low }
}

fn weakest(
    graph: &MapGraph,
    level: usize,
    expected: &HashMap<NodeId, f64>,
    exhausted: &HashSet<NodeId>,
) -> Option<Slot> {
    graph
        .row(level)
        .iter()
        .enumerate()
        .filter(|(_, node)| !node.kind.is_locked() && !exhausted.contains(&node.id))
        .min_by(|(_, left), (_, right)| expected[&left.id].total_cmp(&expected[&right.id]))
        .map(|(position, _)| Slot { level, position })
}

/// Runs the balancer over a finished graph and hands it back.
pub fn balance_choices(mut graph: MapGraph, params: &ParameterSet, threshold: f64) -> MapGraph {
    let promotions = Balancer::new(params, threshold).apply(&mut graph);
    log::debug!("balancer made {} promotions at threshold {threshold}", promotions.len());
    graph
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::mapgen::generate;
    use crate::mapgen::model::MapNode;

    fn node(id: u32, level: usize, parents: &[u32], kind: NodeKind) -> MapNode {
        MapNode::new(NodeId(id), level, parents.iter().map(|&p| NodeId(p)).collect(), kind)
    }

    /// Two branches: a barren one and a rich one.
    fn lopsided() -> MapGraph {
        MapGraph::from_rows(vec![
            vec![node(0, 0, &[], NodeKind::Monster)],
            vec![node(1, 1, &[0], NodeKind::Monster), node(2, 1, &[0], NodeKind::Event)],
            vec![node(3, 2, &[1], NodeKind::Monster), node(4, 2, &[2], NodeKind::Elite)],
            vec![node(5, 3, &[3, 4], NodeKind::Boss)],
        ])
    }

    fn loose_params() -> ParameterSet {
        ParameterSet { levels: 4, rest_rows: vec![], treasure_rows: vec![], ..ParameterSet::default() }
    }

    #[test]
    fn expected_values_fold_bottom_up() {
        let expected = expected_values(&lopsided());
        assert_eq!(expected[&NodeId(5)], 5.0);
        assert_eq!(expected[&NodeId(3)], 5.0);
        assert_eq!(expected[&NodeId(4)], 8.0);
        assert_eq!(expected[&NodeId(1)], 5.0);
        assert_eq!(expected[&NodeId(2)], 9.0);
        assert_eq!(expected[&NodeId(0)], 7.0);
    }

    #[test]
    fn unreachable_threshold_changes_nothing() {
        let graph = lopsided();
        let balanced = balance_choices(graph.clone(), &loose_params(), 999_999.0);
        assert_eq!(balanced, graph);
    }

    #[test]
    fn weak_nodes_are_promoted_until_the_gap_closes() {
        let mut graph = lopsided();
        let promotions = Balancer::new(&loose_params(), 1.0).apply(&mut graph);
        assert!(!promotions.is_empty());

        let expected = expected_values(&graph);
        for level in 1..3 {
            let values: Vec<f64> = graph.row(level).iter().map(|n| expected[&n.id]).collect();
            let gap = values.iter().cloned().fold(f64::MIN, f64::max)
                - values.iter().cloned().fold(f64::MAX, f64::min);
            assert!(gap <= 1.0, "level {level} gap {gap}");
        }
        assert_eq!(promotions[0].node, NodeId(3));
        assert_eq!(promotions[0].to, NodeKind::Shop);
    }

    #[test]
    fn a_node_may_climb_more_than_once() {
        let mut graph = lopsided();
        let promotions = Balancer::new(&loose_params(), 1.0).apply(&mut graph);
        assert_eq!(
            promotions,
            vec![
                Promotion { node: NodeId(3), from: NodeKind::Monster, to: NodeKind::Shop },
                Promotion { node: NodeId(3), from: NodeKind::Shop, to: NodeKind::Elite },
            ]
        );
    }

    #[test]
    fn zero_threshold_terminates_within_the_promotion_chain() {
        let params = ParameterSet {
            shop_extra_cap: 100,
            elite_extra_cap: 100,
            treasure_extra_cap: 100,
            ..ParameterSet::default()
        };
        for seed in 0..10 {
            let mut graph = generate(Some(seed), &params).unwrap().graph;
            let promotions = Balancer::new(&params, 0.0).apply(&mut graph);
            let mut per_node: HashMap<NodeId, usize> = HashMap::new();
            for promotion in &promotions {
                assert!(promotion.to.value() > promotion.from.value());
                *per_node.entry(promotion.node).or_default() += 1;
            }
            assert!(per_node.values().all(|&count| count <= PROMOTION_ORDER.len()), "seed={seed}");
        }
    }

    #[test]
    fn promotions_respect_headroom() {
        let mut params = loose_params();
        params.guaranteed_shops = 0;
        params.shop_extra_cap = 0;
        params.guaranteed_elites = 0;
        params.elite_extra_cap = 1;
        params.treasure_extra_cap = 0;

        let mut graph = lopsided();
        let promotions = Balancer::new(&params, 0.0).apply(&mut graph);
        assert!(promotions.is_empty(), "elite cap is already spent: {promotions:?}");
        assert_eq!(graph, lopsided());
    }

    #[test]
    fn elite_promotion_skips_nodes_next_to_elites() {
        let mut params = loose_params();
        params.shop_extra_cap = 0;
        params.guaranteed_shops = 0;
        params.treasure_extra_cap = 0;

        let mut graph = MapGraph::from_rows(vec![
            vec![node(0, 0, &[], NodeKind::Monster)],
            vec![node(1, 1, &[0], NodeKind::Elite), node(2, 1, &[0], NodeKind::Event)],
            vec![node(3, 2, &[1], NodeKind::Monster), node(4, 2, &[2], NodeKind::Treasure)],
            vec![node(5, 3, &[3, 4], NodeKind::Boss)],
        ]);
        let promotions = Balancer::new(&params, 0.5).apply(&mut graph);
        assert!(promotions.iter().all(|promotion| promotion.node != NodeId(3)));
        let parents: BTreeSet<NodeId> = graph.row(2)[0].parents.clone();
        assert_eq!(parents, BTreeSet::from([NodeId(1)]));
    }

    #[test]
    fn nan_threshold_is_ignored() {
        let mut graph = lopsided();
        assert!(Balancer::new(&loose_params(), f64::NAN).apply(&mut graph).is_empty());
    }
}
