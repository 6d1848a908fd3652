//! Final row-width safety net run on the finished graph.

use std::mem;

use super::assign::Placement;
use super::merge::{MergeRecord, apply_merges, force_merge_at, select_merge_pairs};
use super::model::{MapGraph, MapNode, NodeKind};
use super::params::ParameterSet;

/// Merges any middle row still wider than `max_per_row`, rewriting the next row's parents,
/// then settles leftover placeholder kinds. Returns the number of merges performed.
pub(crate) fn clamp_row_widths(
    graph: &mut MapGraph,
    params: &ParameterSet,
    placement: &mut Placement,
) -> usize {
    let max_per_row = params.max_per_row.max(1);
    let mut merges = 0;

    for level in 1..graph.level_count().saturating_sub(1) {
        if graph.row(level).len() <= max_per_row {
            continue;
        }
        log::debug!("level {level}: {} nodes exceed cap {max_per_row}", graph.row(level).len());

        let mut row = mem::take(&mut graph.rows_mut()[level]);
        let records = shrink_row(&mut row, max_per_row, graph);
        graph.rows_mut()[level] = row;

        for record in &records {
            graph.rewrite_parents(level + 1, &[record.left, record.right], record.merged);
            placement.absorb(record);
        }
        repair_merged_kinds(graph, level, &records, params);
        merges += records.len();
    }

    for row in graph.rows_mut() {
        for node in row.iter_mut().filter(|node| node.kind == NodeKind::Unassigned) {
            node.kind = NodeKind::Monster;
        }
    }
    merges
}

fn shrink_row(row: &mut Vec<MapNode>, target: usize, graph: &mut MapGraph) -> Vec<MergeRecord> {
    let ids = graph.ids_mut();
    let mut records = Vec::new();

    let mut attempts = 2 * row.len();
    while row.len() > target && attempts > 0 {
        attempts -= 1;
        let positions = select_merge_pairs(row, row.len() - target, false);
        if positions.is_empty() {
            break;
        }
        records.extend(apply_merges(row, &positions, ids));
    }

    let mut attempts = 2 * row.len();
    while row.len() > target && row.len() >= 2 && attempts > 0 {
        attempts -= 1;
        records.push(force_merge_at(row, 0, ids));
    }

    while row.len() > target && row.len() >= 2 {
        let trailing = row.len() - 2;
        records.push(force_merge_at(row, trailing, ids));
    }
    records
}

/// Merged nodes inherit the left kind; undo any consecutive elite or rest that creates.
fn repair_merged_kinds(
    graph: &mut MapGraph,
    level: usize,
    records: &[MergeRecord],
    params: &ParameterSet,
) {
    if params.forced_kind(level).is_some() {
        return;
    }
    let index = graph.index();
    for record in records {
        let Some(&slot) = index.get(&record.merged) else {
            continue;
        };
        let node = graph.node_at(slot);
        if !matches!(node.kind, NodeKind::Elite | NodeKind::Rest) {
            continue;
        }
        let repeats = node
            .parents
            .iter()
            .filter_map(|parent| index.get(parent))
            .any(|&parent| graph.node_at(parent).kind == node.kind);
        if repeats {
            graph.node_mut(slot).kind = NodeKind::Monster;
        }
    }
}

impl Placement {
    /// Follows guaranteed ids into the node that absorbed them.
    pub(crate) fn absorb(&mut self, record: &MergeRecord) {
        for ids in [
            &mut self.guaranteed_elites,
            &mut self.guaranteed_shops,
            &mut self.relaxed_elites,
            &mut self.relaxed_shops,
        ] {
            let before = ids.len();
            ids.retain(|id| *id != record.left && *id != record.right);
            if ids.len() != before {
                ids.push(record.merged);
            }
        }
        if self.fixed.remove(&record.left) | self.fixed.remove(&record.right) {
            self.fixed.insert(record.merged);
        }
    }
}
