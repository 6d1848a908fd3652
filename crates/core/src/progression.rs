//! Tracks which map nodes a player has resolved and which are open to them next.

use std::collections::{BTreeSet, HashMap};

use crate::error::ProgressError;
use crate::mapgen::{MapGraph, NodeId, NodeKind};

/// Completion state layered over an immutable [`MapGraph`].
///
/// Level-0 nodes start enabled. Completing a node enables its children; a
/// completed node is never enabled again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapProgress {
    enabled: BTreeSet<NodeId>,
    completed: BTreeSet<NodeId>,
    children: HashMap<NodeId, Vec<NodeId>>,
    kinds: HashMap<NodeId, NodeKind>,
    finish: BTreeSet<NodeId>,
}

impl MapProgress {
    pub fn new(graph: &MapGraph) -> Self {
        let finish = match graph.rows().last() {
            Some(row) if graph.level_count() > 1 => row.iter().map(|node| node.id).collect(),
            _ => BTreeSet::new(),
        };
        Self {
            enabled: graph.row(0).iter().map(|node| node.id).collect(),
            completed: BTreeSet::new(),
            children: graph.children(),
            kinds: graph.nodes().map(|node| (node.id, node.kind)).collect(),
            finish,
        }
    }

    /// Rebuilds progress from a saved completed set. Order does not matter.
    pub fn restore(
        graph: &MapGraph,
        completed: impl IntoIterator<Item = NodeId>,
    ) -> Result<Self, ProgressError> {
        let mut progress = Self::new(graph);
        for id in completed {
            progress.mark_completed(id)?;
        }
        Ok(progress)
    }

    /// Records that `id` was resolved. Returns `Ok(false)` when it already was.
    pub fn mark_completed(&mut self, id: NodeId) -> Result<bool, ProgressError> {
        let Some(children) = self.children.get(&id) else {
            return Err(ProgressError::UnknownNode(id));
        };
        if !self.completed.insert(id) {
            return Ok(false);
        }
        self.enabled.remove(&id);
        for child in children {
            if !self.completed.contains(child) {
                self.enabled.insert(*child);
            }
        }
        log::trace!("completed {id}; {} nodes enabled", self.enabled.len());
        Ok(true)
    }

    pub fn is_enabled(&self, id: NodeId) -> bool {
        self.enabled.contains(&id)
    }

    pub fn is_completed(&self, id: NodeId) -> bool {
        self.completed.contains(&id)
    }

    pub fn enabled(&self) -> &BTreeSet<NodeId> {
        &self.enabled
    }

    pub fn completed(&self) -> &BTreeSet<NodeId> {
        &self.completed
    }

    pub fn kind_of(&self, id: NodeId) -> Option<NodeKind> {
        self.kinds.get(&id).copied()
    }

    /// True once any node on the final level has been completed.
    pub fn is_finished(&self) -> bool {
        !self.finish.is_disjoint(&self.completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapgen::MapNode;

    fn node(id: u32, level: usize, parents: &[u32], kind: NodeKind) -> MapNode {
        MapNode::new(NodeId(id), level, parents.iter().map(|&p| NodeId(p)).collect(), kind)
    }

    fn diamond() -> MapGraph {
        MapGraph::from_rows(vec![
            vec![node(0, 0, &[], NodeKind::Monster), node(1, 0, &[], NodeKind::Monster)],
            vec![node(2, 1, &[0], NodeKind::Event), node(3, 1, &[0, 1], NodeKind::Shop)],
            vec![node(4, 2, &[2, 3], NodeKind::Boss)],
        ])
    }

    #[test]
    fn start_row_is_enabled_initially() {
        let progress = MapProgress::new(&diamond());
        assert_eq!(progress.enabled(), &BTreeSet::from([NodeId(0), NodeId(1)]));
        assert!(progress.completed().is_empty());
    }

    #[test]
    fn completing_a_node_opens_its_children() {
        let mut progress = MapProgress::new(&diamond());
        assert_eq!(progress.mark_completed(NodeId(0)), Ok(true));
        assert!(progress.is_completed(NodeId(0)));
        assert!(!progress.is_enabled(NodeId(0)));
        assert_eq!(progress.enabled(), &BTreeSet::from([NodeId(1), NodeId(2), NodeId(3)]));
    }

    #[test]
    fn completing_twice_is_a_no_op() {
        let mut progress = MapProgress::new(&diamond());
        progress.mark_completed(NodeId(1)).unwrap();
        let before = progress.clone();
        assert_eq!(progress.mark_completed(NodeId(1)), Ok(false));
        assert_eq!(progress, before);
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let mut progress = MapProgress::new(&diamond());
        assert_eq!(progress.mark_completed(NodeId(42)), Err(ProgressError::UnknownNode(NodeId(42))));
        assert_eq!(progress, MapProgress::new(&diamond()));
    }

    #[test]
    fn completed_nodes_are_not_re_enabled() {
        let mut progress = MapProgress::new(&diamond());
        progress.mark_completed(NodeId(3)).unwrap();
        progress.mark_completed(NodeId(1)).unwrap();
        assert!(!progress.is_enabled(NodeId(3)));
        assert!(progress.enabled().is_disjoint(progress.completed()));
    }

    #[test]
    fn restore_matches_incremental_progress() {
        let graph = diamond();
        let mut live = MapProgress::new(&graph);
        for id in [NodeId(0), NodeId(3), NodeId(4)] {
            live.mark_completed(id).unwrap();
        }
        let restored =
            MapProgress::restore(&graph, [NodeId(4), NodeId(3), NodeId(0)]).unwrap();
        assert_eq!(restored, live);
        assert!(restored.is_finished());
    }

    #[test]
    fn kinds_are_queryable() {
        let progress = MapProgress::new(&diamond());
        assert_eq!(progress.kind_of(NodeId(3)), Some(NodeKind::Shop));
        assert_eq!(progress.kind_of(NodeId(99)), None);
        assert!(!progress.is_finished());
    }
}
