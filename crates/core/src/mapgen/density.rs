//! Guarantees no path runs too long without a combat node.

use std::collections::{HashMap, HashSet};

use super::model::{MapGraph, NodeId, NodeKind, Slot};

struct Frame {
    node: NodeId,
    /// Non-combat nodes seen since the last monster or elite, oldest first.
    suffix: Vec<NodeId>,
    depth: usize,
}

/// Walks every path from the start row. When a non-combat run reaches `threshold`, the
/// first node of the run becomes a monster unless it is locked or `protected`, in which
/// case the run is left alone. Walks repeat until one changes nothing, so every run seen
/// reflects earlier conversions. Returns the number of nodes changed.
pub(crate) fn enforce_monster_density(
    graph: &mut MapGraph,
    threshold: usize,
    protected: &HashSet<NodeId>,
) -> usize {
    let mut converted = 0;
    // Each walk that changes something turns at least one node into a monster for good.
    for _ in 0..=graph.node_count() {
        let changed = walk(graph, threshold, protected);
        if changed == 0 {
            break;
        }
        converted += changed;
    }

    if converted > 0 {
        log::debug!("converted {converted} nodes to monsters to break long non-combat runs");
    }
    converted
}

fn walk(graph: &mut MapGraph, threshold: usize, protected: &HashSet<NodeId>) -> usize {
    let index = graph.index();
    let children = graph.children();
    let mut explored: HashSet<(NodeId, Vec<NodeId>)> = HashSet::new();
    let mut path: Vec<NodeId> = Vec::new();
    let mut converted = 0;

    let mut stack: Vec<Frame> = graph
        .row(0)
        .iter()
        .rev()
        .map(|node| Frame { node: node.id, suffix: Vec::new(), depth: 0 })
        .collect();

    while let Some(Frame { node, mut suffix, depth }) = stack.pop() {
        path.truncate(depth);
        if path.contains(&node) {
            continue;
        }
        // A sibling branch may have converted part of the run since this frame was queued.
        if let Some(last) =
            suffix.iter().rposition(|id| graph.node_at(index[id]).kind.is_combat())
        {
            suffix.drain(..=last);
        }
        if !explored.insert((node, suffix.clone())) {
            continue;
        }
        path.push(node);

        let slot = index[&node];
        if graph.node_at(slot).kind.is_combat() {
            suffix.clear();
        } else {
            suffix.push(node);
            if suffix.len() >= threshold && relieve(graph, &index, &mut suffix, protected) {
                converted += 1;
            }
        }

        for &child in children[&node].iter().rev() {
            stack.push(Frame { node: child, suffix: suffix.clone(), depth: depth + 1 });
        }
    }
    converted
}

/// Converts the node opening the run, unless it is locked or protected.
fn relieve(
    graph: &mut MapGraph,
    index: &HashMap<NodeId, Slot>,
    suffix: &mut Vec<NodeId>,
    protected: &HashSet<NodeId>,
) -> bool {
    let Some(&first) = suffix.first() else {
        return false;
    };
    let node = graph.node_mut(index[&first]);
    if node.kind.is_locked() || protected.contains(&first) {
        return false;
    }
    log::trace!("level {}: {} {:?} becomes a monster", node.level, node.id, node.kind);
    node.kind = NodeKind::Monster;
    suffix.remove(0);
    true
}
