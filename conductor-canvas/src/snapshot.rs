//! Canvas state snapshots and their diffs (§4.10 "Initial state & diff").
//!
//! Deliberately decoupled from `conductor-workflow::Node`/`Edge` — the
//! fabric only needs the fields a client renders, the same way
//! `conductor_protocol::NodeView` decouples node execution from the full
//! persisted record.

use conductor_protocol::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 2-D canvas placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

/// A node as a client sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// The node's identifier.
    pub id: NodeId,
    /// The node's kind tag (`conductor_protocol::NodeKind::tag`).
    pub node_type: String,
    /// Display position.
    pub position: Position,
    /// Free-form display/config data.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// An edge as a client sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    /// The edge's identifier.
    pub id: EdgeId,
    /// Source node id.
    pub source_id: NodeId,
    /// Target node id.
    pub target_id: NodeId,
}

/// The full canvas state for one workflow at a point in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    /// Nodes present on the canvas.
    pub nodes: Vec<NodeSnapshot>,
    /// Edges present on the canvas.
    pub edges: Vec<EdgeSnapshot>,
}

/// Per-field changes found on a node that exists in both snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeChanges {
    /// New position, if it moved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// New data, if it changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// New type tag, if it changed (should not happen in practice; kept
    /// as a safety check, mirroring the original sync service).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
}

impl NodeChanges {
    fn is_empty(&self) -> bool {
        self.position.is_none() && self.data.is_none() && self.node_type.is_none()
    }
}

/// One modified node: its id plus the fields that changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedNode {
    /// The node's identifier.
    pub id: NodeId,
    /// What changed.
    pub changes: NodeChanges,
}

/// The difference between two [`CanvasSnapshot`]s.
#[derive(Debug, Clone, Default)]
pub struct CanvasDiff {
    /// Nodes present in the new snapshot but not the old.
    pub added_nodes: Vec<NodeSnapshot>,
    /// Node ids present in the old snapshot but not the new.
    pub removed_nodes: Vec<NodeId>,
    /// Nodes present in both with at least one changed field.
    pub modified_nodes: Vec<ModifiedNode>,
    /// Edges present in the new snapshot but not the old.
    pub added_edges: Vec<EdgeSnapshot>,
    /// Edge ids present in the old snapshot but not the new.
    pub removed_edges: Vec<EdgeId>,
}

impl CanvasDiff {
    /// Whether nothing changed between the two snapshots.
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.modified_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
    }
}

/// Compare two snapshots and compute their diff (§4.10).
pub fn diff(old: &CanvasSnapshot, new: &CanvasSnapshot) -> CanvasDiff {
    let old_nodes: HashMap<&NodeId, &NodeSnapshot> = old.nodes.iter().map(|n| (&n.id, n)).collect();
    let new_nodes: HashMap<&NodeId, &NodeSnapshot> = new.nodes.iter().map(|n| (&n.id, n)).collect();
    let old_edges: HashMap<&EdgeId, &EdgeSnapshot> = old.edges.iter().map(|e| (&e.id, e)).collect();
    let new_edges: HashMap<&EdgeId, &EdgeSnapshot> = new.edges.iter().map(|e| (&e.id, e)).collect();

    let added_nodes = new.nodes.iter().filter(|n| !old_nodes.contains_key(&n.id)).cloned().collect();
    let removed_nodes =
        old.nodes.iter().filter(|n| !new_nodes.contains_key(&n.id)).map(|n| n.id.clone()).collect();

    let modified_nodes = new
        .nodes
        .iter()
        .filter_map(|new_node| {
            let old_node = old_nodes.get(&new_node.id)?;
            let changes = compare_nodes(old_node, new_node);
            if changes.is_empty() {
                None
            } else {
                Some(ModifiedNode { id: new_node.id.clone(), changes })
            }
        })
        .collect();

    let added_edges = new.edges.iter().filter(|e| !old_edges.contains_key(&e.id)).cloned().collect();
    let removed_edges =
        old.edges.iter().filter(|e| !new_edges.contains_key(&e.id)).map(|e| e.id.clone()).collect();

    CanvasDiff { added_nodes, removed_nodes, modified_nodes, added_edges, removed_edges }
}

fn compare_nodes(old: &NodeSnapshot, new: &NodeSnapshot) -> NodeChanges {
    let mut changes = NodeChanges::default();
    if old.position != new.position {
        changes.position = Some(new.position);
    }
    if old.data != new.data {
        changes.data = Some(new.data.clone());
    }
    if old.node_type != new.node_type {
        changes.node_type = Some(new.node_type.clone());
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, x: f64) -> NodeSnapshot {
        NodeSnapshot {
            id: NodeId::from(id),
            node_type: "default".into(),
            position: Position { x, y: 0.0 },
            data: serde_json::json!({}),
        }
    }

    #[test]
    fn detects_added_and_removed_nodes() {
        let old = CanvasSnapshot { nodes: vec![node("a", 0.0)], edges: vec![] };
        let new = CanvasSnapshot { nodes: vec![node("b", 0.0)], edges: vec![] };

        let d = diff(&old, &new);
        assert_eq!(d.added_nodes.len(), 1);
        assert_eq!(d.removed_nodes, vec![NodeId::from("a")]);
        assert!(d.modified_nodes.is_empty());
    }

    #[test]
    fn detects_position_change_as_a_modification() {
        let old = CanvasSnapshot { nodes: vec![node("a", 0.0)], edges: vec![] };
        let new = CanvasSnapshot { nodes: vec![node("a", 5.0)], edges: vec![] };

        let d = diff(&old, &new);
        assert_eq!(d.modified_nodes.len(), 1);
        assert_eq!(d.modified_nodes[0].changes.position, Some(Position { x: 5.0, y: 0.0 }));
        assert!(d.modified_nodes[0].changes.data.is_none());
    }

    #[test]
    fn identical_snapshots_produce_an_empty_diff() {
        let snapshot = CanvasSnapshot { nodes: vec![node("a", 0.0)], edges: vec![] };
        let d = diff(&snapshot, &snapshot.clone());
        assert!(d.is_empty());
    }
}
