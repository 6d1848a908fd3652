//! Public data models for the layered encounter graph.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Placeholder carried while the graph is under construction.
    Unassigned,
    Start,
    Monster,
    Elite,
    Event,
    Shop,
    Rest,
    Treasure,
    Boss,
}

impl NodeKind {
    /// Reward scalar used by the balancer.
    pub fn value(self) -> f64 {
        match self {
            Self::Unassigned | Self::Start | Self::Monster => 0.0,
            Self::Rest => 0.5,
            Self::Event => 1.0,
            Self::Shop => 1.5,
            Self::Treasure => 2.0,
            Self::Elite => 3.0,
            Self::Boss => 5.0,
        }
    }

    /// Kinds no later pass may overwrite.
    pub fn is_locked(self) -> bool {
        matches!(self, Self::Rest | Self::Treasure | Self::Boss | Self::Start)
    }

    pub fn is_combat(self) -> bool {
        matches!(self, Self::Monster | Self::Elite)
    }

    pub fn glyph(self) -> char {
        match self {
            Self::Unassigned => '.',
            Self::Start => 'S',
            Self::Monster => 'M',
            Self::Elite => 'E',
            Self::Event => '?',
            Self::Shop => '$',
            Self::Rest => 'R',
            Self::Treasure => 'T',
            Self::Boss => 'B',
        }
    }

    fn code(self) -> u8 {
        match self {
            Self::Unassigned => 0,
            Self::Start => 1,
            Self::Monster => 2,
            Self::Elite => 3,
            Self::Event => 4,
            Self::Shop => 5,
            Self::Rest => 6,
            Self::Treasure => 7,
            Self::Boss => 8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapNode {
    pub id: NodeId,
    pub level: usize,
    pub parents: BTreeSet<NodeId>,
    pub kind: NodeKind,
    #[serde(default)]
    pub merged_from: bool,
}

impl MapNode {
    pub fn new(id: NodeId, level: usize, parents: BTreeSet<NodeId>, kind: NodeKind) -> Self {
        Self { id, level, parents, kind, merged_from: false }
    }
}

/// Hands out node ids in creation order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn starting_at(next: u32) -> Self {
        Self { next }
    }

    pub fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// Position of a node inside [`MapGraph::rows`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    pub level: usize,
    pub position: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapGraph {
    rows: Vec<Vec<MapNode>>,
    #[serde(default)]
    ids: IdAllocator,
}

impl MapGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a graph from finished rows, resuming id allocation after the largest id.
    pub fn from_rows(rows: Vec<Vec<MapNode>>) -> Self {
        let next = rows.iter().flatten().map(|node| node.id.0 + 1).max().unwrap_or(0);
        Self { rows, ids: IdAllocator::starting_at(next) }
    }

    pub fn rows(&self) -> &[Vec<MapNode>] {
        &self.rows
    }

    pub fn row(&self, level: usize) -> &[MapNode] {
        self.rows.get(level).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn level_count(&self) -> usize {
        self.rows.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &MapNode> {
        self.rows.iter().flatten()
    }

    pub fn node_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.nodes().filter(|node| node.kind == kind).count()
    }

    pub(crate) fn push_row(&mut self, row: Vec<MapNode>) {
        self.rows.push(row);
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Vec<MapNode>] {
        &mut self.rows
    }

    pub(crate) fn ids_mut(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    pub(crate) fn node_mut(&mut self, slot: Slot) -> &mut MapNode {
        &mut self.rows[slot.level][slot.position]
    }

    pub fn node_at(&self, slot: Slot) -> &MapNode {
        &self.rows[slot.level][slot.position]
    }

    /// Id lookup table; rebuild after any structural change.
    pub fn index(&self) -> HashMap<NodeId, Slot> {
        let mut index = HashMap::with_capacity(self.node_count());
        for (level, row) in self.rows.iter().enumerate() {
            for (position, node) in row.iter().enumerate() {
                index.insert(node.id, Slot { level, position });
            }
        }
        index
    }

    /// Child ids per node, in row order.
    pub fn children(&self) -> HashMap<NodeId, Vec<NodeId>> {
        let mut children: HashMap<NodeId, Vec<NodeId>> =
            self.nodes().map(|node| (node.id, Vec::new())).collect();
        for node in self.nodes() {
            for parent in &node.parents {
                children.entry(*parent).or_default().push(node.id);
            }
        }
        children
    }

    /// Replaces merged-away parents in `level` with the node that absorbed them.
    pub(crate) fn rewrite_parents(&mut self, level: usize, absorbed: &[NodeId], merged: NodeId) {
        let Some(row) = self.rows.get_mut(level) else {
            return;
        };
        for node in row {
            let before = node.parents.len();
            node.parents.retain(|parent| !absorbed.contains(parent));
            if node.parents.len() != before {
                node.parents.insert(merged);
            }
        }
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend((self.rows.len() as u32).to_le_bytes());
        for row in &self.rows {
            bytes.extend((row.len() as u32).to_le_bytes());
            for node in row {
                bytes.extend(node.id.0.to_le_bytes());
                bytes.extend((node.level as u32).to_le_bytes());
                bytes.push(node.kind.code());
                bytes.push(u8::from(node.merged_from));
                bytes.extend((node.parents.len() as u32).to_le_bytes());
                for parent in &node.parents {
                    bytes.extend(parent.0.to_le_bytes());
                }
            }
        }
        bytes
    }

    pub fn fingerprint(&self) -> u64 {
        xxh3_64(&self.canonical_bytes())
    }
}
