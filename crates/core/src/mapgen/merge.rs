//! Adjacent-pair merging that keeps row widths inside their caps.

use std::mem;

use super::model::{IdAllocator, MapNode, NodeId};
use super::seed::MapRng;

/// Largest parent set a merged node may end up with under the normal rules.
pub(crate) const MAX_MERGED_PARENTS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct MergeRecord {
    pub(crate) left: NodeId,
    pub(crate) right: NodeId,
    pub(crate) merged: NodeId,
}

pub(crate) fn merge_pair(left: &MapNode, right: &MapNode, id: NodeId) -> MapNode {
    MapNode {
        id,
        level: left.level,
        parents: left.parents.union(&right.parents).copied().collect(),
        kind: left.kind,
        merged_from: true,
    }
}

fn union_size(left: &MapNode, right: &MapNode) -> usize {
    left.parents.union(&right.parents).count()
}

/// Left positions of up to `limit` non-overlapping legal pairs, fewest merged parents first.
pub(crate) fn select_merge_pairs(row: &[MapNode], limit: usize, skip_merged: bool) -> Vec<usize> {
    let mut candidates: Vec<(usize, usize)> = row
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| !skip_merged || !(pair[0].merged_from || pair[1].merged_from))
        .map(|(position, pair)| (union_size(&pair[0], &pair[1]), position))
        .filter(|&(size, _)| size <= MAX_MERGED_PARENTS)
        .collect();
    candidates.sort_unstable();

    let mut taken = vec![false; row.len()];
    let mut selected = Vec::new();
    for (_, position) in candidates {
        if selected.len() >= limit {
            break;
        }
        if taken[position] || taken[position + 1] {
            continue;
        }
        taken[position] = true;
        taken[position + 1] = true;
        selected.push(position);
    }
    selected.sort_unstable();
    selected
}

/// Merges each pair starting at `positions`, which must be sorted and non-overlapping.
pub(crate) fn apply_merges(
    row: &mut Vec<MapNode>,
    positions: &[usize],
    ids: &mut IdAllocator,
) -> Vec<MergeRecord> {
    let drained = mem::take(row);
    let mut records = Vec::with_capacity(positions.len());
    let mut pending = positions.iter().copied().peekable();
    let mut nodes = drained.into_iter().enumerate();

    while let Some((position, node)) = nodes.next() {
        if pending.peek() != Some(&position) {
            row.push(node);
            continue;
        }
        pending.next();
        let Some((_, right)) = nodes.next() else {
            row.push(node);
            break;
        };
        let merged = merge_pair(&node, &right, ids.allocate());
        log::trace!("level {}: merged {} and {} into {}", node.level, node.id, right.id, merged.id);
        records.push(MergeRecord { left: node.id, right: right.id, merged: merged.id });
        row.push(merged);
    }
    records
}

/// Merges `row[position]` with its right neighbour regardless of parent counts.
pub(crate) fn force_merge_at(
    row: &mut Vec<MapNode>,
    position: usize,
    ids: &mut IdAllocator,
) -> MergeRecord {
    let right = row.remove(position + 1);
    let merged = merge_pair(&row[position], &right, ids.allocate());
    let record = MergeRecord { left: row[position].id, right: right.id, merged: merged.id };
    log::trace!("level {}: forced merge of {} and {}", merged.level, record.left, record.right);
    row[position] = merged;
    record
}

/// Shrinks `row` to `target` nodes, preferring legal pairs and forcing the leading pair otherwise.
pub(crate) fn merge_down_to(
    row: &mut Vec<MapNode>,
    target: usize,
    ids: &mut IdAllocator,
) -> Vec<MergeRecord> {
    let target = target.max(1);
    let round_limit = 2 * row.len().max(1);
    let mut records = Vec::new();
    let mut rounds = 0;

    while row.len() > target {
        assert!(rounds < round_limit, "row merge exceeded {round_limit} rounds");
        rounds += 1;

        let positions = select_merge_pairs(row, row.len() - target, false);
        if positions.is_empty() {
            records.push(force_merge_at(row, 0, ids));
        } else {
            records.extend(apply_merges(row, &positions, ids));
        }
    }
    records
}

/// Merges each eligible pair with probability `chance`; never leaves fewer than two nodes.
pub(crate) fn probabilistic_merge(
    row: &mut Vec<MapNode>,
    chance: f64,
    rng: &mut MapRng,
    ids: &mut IdAllocator,
) -> Vec<MergeRecord> {
    if chance <= 0.0 || row.len() <= 2 {
        return Vec::new();
    }
    let chosen: Vec<usize> = select_merge_pairs(row, row.len() - 2, true)
        .into_iter()
        .filter(|_| rng.chance(chance))
        .collect();
    apply_merges(row, &chosen, ids)
}

/// Duplicates the first node's parents into fresh nodes until the row holds two.
pub(crate) fn pad_row(row: &mut Vec<MapNode>, ids: &mut IdAllocator) {
    while row.len() < 2 {
        let Some(first) = row.first() else {
            return;
        };
        let padding = MapNode::new(ids.allocate(), first.level, first.parents.clone(), first.kind);
        row.push(padding);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::mapgen::model::NodeKind;

    fn single_parent_row(count: u32, ids: &mut IdAllocator) -> Vec<MapNode> {
        (0..count)
            .map(|parent| {
                let parents = BTreeSet::from([NodeId(1_000 + parent)]);
                MapNode::new(ids.allocate(), 3, parents, NodeKind::Unassigned)
            })
            .collect()
    }

    #[test]
    fn merged_node_takes_parent_union_and_fresh_id() {
        let mut ids = IdAllocator::default();
        let row = single_parent_row(2, &mut ids);
        let merged = merge_pair(&row[0], &row[1], ids.allocate());
        assert_eq!(merged.id, NodeId(2));
        assert!(merged.merged_from);
        assert_eq!(merged.parents, BTreeSet::from([NodeId(1_000), NodeId(1_001)]));
    }

    #[test]
    fn selection_prefers_smaller_unions_and_never_overlaps() {
        let mut ids = IdAllocator::default();
        let shared = BTreeSet::from([NodeId(50)]);
        let row = vec![
            MapNode::new(ids.allocate(), 2, BTreeSet::from([NodeId(40)]), NodeKind::Unassigned),
            MapNode::new(ids.allocate(), 2, shared.clone(), NodeKind::Unassigned),
            MapNode::new(ids.allocate(), 2, shared, NodeKind::Unassigned),
            MapNode::new(ids.allocate(), 2, BTreeSet::from([NodeId(60)]), NodeKind::Unassigned),
        ];

        assert_eq!(select_merge_pairs(&row, 1, false), vec![1]);
        // Taking the shared pair blocks both neighbours.
        assert_eq!(select_merge_pairs(&row, 3, false), vec![1]);
    }

    #[test]
    fn selection_rejects_pairs_with_more_than_two_parents() {
        let mut ids = IdAllocator::default();
        let row = vec![
            MapNode::new(ids.allocate(), 2, BTreeSet::from([NodeId(1), NodeId(2)]), NodeKind::Event),
            MapNode::new(ids.allocate(), 2, BTreeSet::from([NodeId(3)]), NodeKind::Event),
        ];
        assert!(select_merge_pairs(&row, 1, false).is_empty());
    }

    #[test]
    fn merge_down_to_reaches_target_exactly() {
        let mut ids = IdAllocator::default();
        let mut row = single_parent_row(7, &mut ids);
        let records = merge_down_to(&mut row, 3, &mut ids);
        assert_eq!(row.len(), 3);
        assert_eq!(records.len(), 4);
    }

    #[test]
    fn merge_down_to_falls_back_when_no_pair_is_legal() {
        let mut ids = IdAllocator::default();
        let mut row: Vec<MapNode> = (0..4_u32)
            .map(|index| {
                let parents = BTreeSet::from([NodeId(100 + 2 * index), NodeId(101 + 2 * index)]);
                MapNode::new(ids.allocate(), 5, parents, NodeKind::Unassigned)
            })
            .collect();
        merge_down_to(&mut row, 2, &mut ids);
        assert_eq!(row.len(), 2);
        assert_eq!(row[0].parents.len(), 6);
    }

    #[test]
    fn probabilistic_merge_keeps_two_nodes_and_skips_merged_nodes() {
        let mut ids = IdAllocator::default();
        let mut rng = MapRng::from_seed(11);
        let mut row = single_parent_row(3, &mut ids);
        probabilistic_merge(&mut row, 1.0, &mut rng, &mut ids);
        assert_eq!(row.len(), 2);

        let mut merged_row = single_parent_row(4, &mut ids);
        for node in &mut merged_row {
            node.merged_from = true;
        }
        let records = probabilistic_merge(&mut merged_row, 1.0, &mut rng, &mut ids);
        assert!(records.is_empty());
        assert_eq!(merged_row.len(), 4);
    }

    #[test]
    fn pad_row_copies_first_parent_set() {
        let mut ids = IdAllocator::default();
        let mut row = single_parent_row(1, &mut ids);
        pad_row(&mut row, &mut ids);
        assert_eq!(row.len(), 2);
        assert_eq!(row[0].parents, row[1].parents);
        assert_ne!(row[0].id, row[1].id);
    }
}
