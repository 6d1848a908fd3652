//! Structural checks over a finished graph.

use std::collections::{BTreeSet, HashSet};

use thiserror::Error;

use super::model::{MapGraph, NodeId, NodeKind};
use super::params::ParameterSet;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Violation {
    #[error("graph has {found} levels, expected {expected}")]
    LevelCount { expected: usize, found: usize },
    #[error("level {level} has {width} nodes")]
    RowWidth { level: usize, width: usize },
    #[error("node {0} appears more than once")]
    DuplicateId(NodeId),
    #[error("node {node} at level {level} has no parents")]
    Orphan { node: NodeId, level: usize },
    #[error("node {node} lists parent {parent} that is missing or not above it")]
    BadParent { node: NodeId, parent: NodeId },
    #[error("node {node} on level {level} is {found:?}, expected {expected:?}")]
    ForcedKind { node: NodeId, level: usize, expected: NodeKind, found: NodeKind },
    #[error("boss {boss} is not connected to the whole previous row")]
    BossParents { boss: NodeId },
    #[error("{kind:?} node {node} follows a {kind:?} parent {parent}")]
    Consecutive { node: NodeId, parent: NodeId, kind: NodeKind },
    #[error("node {0} was never given a kind")]
    Placeholder(NodeId),
}

/// Lists every structural rule `graph` breaks; empty for a well-formed map.
pub fn audit(graph: &MapGraph, params: &ParameterSet) -> Vec<Violation> {
    let mut violations = Vec::new();
    let levels = graph.level_count();
    if levels != params.levels {
        violations.push(Violation::LevelCount { expected: params.levels, found: levels });
    }

    for (level, row) in graph.rows().iter().enumerate() {
        let width = row.len();
        let legal = if level == 0 {
            (1..=3).contains(&width)
        } else if level + 1 == levels {
            width == 1
        } else {
            (2..=params.max_per_row).contains(&width)
        };
        if !legal {
            violations.push(Violation::RowWidth { level, width });
        }
    }

    let index = graph.index();
    let mut seen = HashSet::with_capacity(graph.node_count());
    for node in graph.nodes() {
        if !seen.insert(node.id) {
            violations.push(Violation::DuplicateId(node.id));
        }
        if node.kind == NodeKind::Unassigned {
            violations.push(Violation::Placeholder(node.id));
        }
        if node.level > 0 && node.parents.is_empty() {
            violations.push(Violation::Orphan { node: node.id, level: node.level });
        }

        for &parent in &node.parents {
            let Some(&slot) = index.get(&parent).filter(|slot| slot.level < node.level) else {
                violations.push(Violation::BadParent { node: node.id, parent });
                continue;
            };
            let parent_kind = graph.node_at(slot).kind;
            if matches!(node.kind, NodeKind::Elite | NodeKind::Rest) && parent_kind == node.kind {
                violations.push(Violation::Consecutive { node: node.id, parent, kind: node.kind });
            }
        }

        if let Some(expected) = params.forced_kind(node.level)
            && node.kind != expected
        {
            violations.push(Violation::ForcedKind {
                node: node.id,
                level: node.level,
                expected,
                found: node.kind,
            });
        }
    }

    if let [.., previous, boss_row] = graph.rows()
        && let [boss] = boss_row.as_slice()
    {
        let expected: BTreeSet<NodeId> = previous.iter().map(|node| node.id).collect();
        if boss.parents != expected {
            violations.push(Violation::BossParents { boss: boss.id });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapgen::model::MapNode;

    fn node(id: u32, level: usize, parents: &[u32], kind: NodeKind) -> MapNode {
        MapNode::new(NodeId(id), level, parents.iter().map(|&p| NodeId(p)).collect(), kind)
    }

    fn params() -> ParameterSet {
        ParameterSet { levels: 4, rest_rows: vec![], treasure_rows: vec![], ..ParameterSet::default() }
    }

    fn well_formed() -> MapGraph {
        MapGraph::from_rows(vec![
            vec![node(0, 0, &[], NodeKind::Monster)],
            vec![node(1, 1, &[0], NodeKind::Elite), node(2, 1, &[0], NodeKind::Event)],
            vec![node(3, 2, &[1], NodeKind::Rest), node(4, 2, &[2], NodeKind::Shop)],
            vec![node(5, 3, &[3, 4], NodeKind::Boss)],
        ])
    }

    #[test]
    fn well_formed_graph_passes() {
        assert_eq!(audit(&well_formed(), &params()), Vec::new());
    }

    #[test]
    fn consecutive_elites_are_reported() {
        let mut graph = well_formed();
        graph.rows_mut()[2][0].kind = NodeKind::Elite;
        assert_eq!(
            audit(&graph, &params()),
            vec![Violation::Consecutive {
                node: NodeId(3),
                parent: NodeId(1),
                kind: NodeKind::Elite
            }]
        );
    }

    #[test]
    fn partial_boss_fan_in_is_reported() {
        let mut graph = well_formed();
        graph.rows_mut()[3][0].parents.remove(&NodeId(4));
        assert_eq!(audit(&graph, &params()), vec![Violation::BossParents { boss: NodeId(5) }]);
    }

    #[test]
    fn forced_rows_and_placeholders_are_checked() {
        let mut graph = well_formed();
        graph.rows_mut()[1][1].kind = NodeKind::Unassigned;
        let mut params = params();
        params.rest_rows = vec![2];

        let violations = audit(&graph, &params);
        assert!(violations.contains(&Violation::Placeholder(NodeId(2))));
        assert!(violations.contains(&Violation::ForcedKind {
            node: NodeId(4),
            level: 2,
            expected: NodeKind::Rest,
            found: NodeKind::Shop,
        }));
    }

    #[test]
    fn narrow_middle_rows_and_dangling_parents_are_reported() {
        let graph = MapGraph::from_rows(vec![
            vec![node(0, 0, &[], NodeKind::Monster)],
            vec![node(1, 1, &[7], NodeKind::Event)],
            vec![node(2, 2, &[1], NodeKind::Event)],
            vec![node(3, 3, &[2], NodeKind::Boss)],
        ]);
        let violations = audit(&graph, &params());
        assert!(violations.contains(&Violation::RowWidth { level: 1, width: 1 }));
        assert!(violations.contains(&Violation::BadParent { node: NodeId(1), parent: NodeId(7) }));
    }
}
