//! Durable JSON form of a generated map and its completion state.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::mapgen::{MapGraph, MapNode, NodeId, NodeKind};
use crate::progression::MapProgress;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: NodeId,
    pub level: usize,
    pub parents: Vec<NodeId>,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub merged_from: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub format_version: u32,
    pub seed: u64,
    /// Nodes in level order, then left-to-right within a level.
    pub nodes: Vec<SnapshotNode>,
    pub completed: Vec<NodeId>,
}

impl MapSnapshot {
    pub fn capture(seed: u64, graph: &MapGraph, progress: &MapProgress) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| SnapshotNode {
                id: node.id,
                level: node.level,
                parents: node.parents.iter().copied().collect(),
                kind: node.kind,
                merged_from: node.merged_from,
            })
            .collect();
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            seed,
            nodes,
            completed: progress.completed().iter().copied().collect(),
        }
    }

    pub fn write_atomic(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;

        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;
        log::debug!("wrote map snapshot to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&content)?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.format_version));
        }
        Ok(snapshot)
    }

    /// Rebuilds the graph and progress, rejecting node lists that do not form a layered DAG.
    pub fn restore(&self) -> Result<(MapGraph, MapProgress), SnapshotError> {
        let mut rows: Vec<Vec<MapNode>> = Vec::new();
        let mut levels: HashMap<NodeId, usize> = HashMap::with_capacity(self.nodes.len());

        for node in &self.nodes {
            if levels.insert(node.id, node.level).is_some() {
                return Err(inconsistent(format!("node {} appears twice", node.id)));
            }
            match node.level {
                level if level == rows.len() => rows.push(Vec::new()),
                level if level + 1 == rows.len() => {}
                level => {
                    return Err(inconsistent(format!(
                        "node {} on level {level} is out of order",
                        node.id
                    )));
                }
            }
            let parents: BTreeSet<NodeId> = node.parents.iter().copied().collect();
            let mut restored = MapNode::new(node.id, node.level, parents, node.kind);
            restored.merged_from = node.merged_from;
            rows[node.level].push(restored);
        }

        for node in &self.nodes {
            if node.level > 0 && node.parents.is_empty() {
                return Err(inconsistent(format!("node {} has no parents", node.id)));
            }
            for parent in &node.parents {
                if !levels.get(parent).is_some_and(|&level| level < node.level) {
                    return Err(inconsistent(format!(
                        "node {} has parent {parent} that is missing or not above it",
                        node.id
                    )));
                }
            }
        }

        let graph = MapGraph::from_rows(rows);
        let progress = MapProgress::restore(&graph, self.completed.iter().copied())
            .map_err(|error| inconsistent(error.to_string()))?;
        Ok((graph, progress))
    }
}

fn inconsistent(reason: String) -> SnapshotError {
    SnapshotError::Inconsistent(reason)
}
