//! The workflow graph data model (§3 "Workflow").

use conductor_protocol::{DurationMs, EdgeId, NodeId, NodeKind, WorkflowId};
use serde::{Deserialize, Serialize};

/// 2-D canvas placement, carried through persistence purely for display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

/// One node in a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier, unique within the workflow.
    pub id: NodeId,
    /// The node's kind.
    pub kind: NodeKind,
    /// Free-form configuration mapping.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Canvas display position.
    #[serde(default)]
    pub position: Position,
    /// How many times C5 should retry this node on a retryable failure.
    #[serde(default)]
    pub retry_count: u32,
}

impl Node {
    /// The node's configured timeout, defaulting to 30s (§4.2).
    pub fn timeout(&self) -> DurationMs {
        self.config
            .get("timeout")
            .and_then(|v| v.as_u64())
            .map(DurationMs::from_millis)
            .unwrap_or_else(|| DurationMs::from_secs(30))
    }

    /// A decoupled [`conductor_protocol::NodeView`] for executor dispatch.
    pub fn to_view(&self) -> conductor_protocol::NodeView {
        conductor_protocol::NodeView {
            id: self.id.clone(),
            kind: self.kind.clone(),
            config: self.config.clone(),
            retry_count: self.retry_count,
            timeout: self.timeout(),
        }
    }
}

/// One directed edge in a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Stable identifier, unique within the workflow.
    pub id: EdgeId,
    /// The edge's source node id.
    pub source: NodeId,
    /// The edge's target node id.
    pub target: NodeId,
}

/// An identified graph: an ordered set of nodes plus an ordered set of edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Stable identifier.
    pub id: WorkflowId,
    /// Display name.
    pub name: String,
    /// The graph's nodes, in persistence order.
    pub nodes: Vec<Node>,
    /// The graph's edges, in persistence order.
    pub edges: Vec<Edge>,
}

impl Workflow {
    /// Edges whose target is `node`, in the order they appear in `edges`
    /// (the order the DAG executor gathers predecessor inputs in, §4.2).
    pub fn predecessors_of<'a>(&'a self, node: &'a NodeId) -> impl Iterator<Item = &'a NodeId> {
        self.edges.iter().filter(move |e| &e.target == node).map(|e| &e.source)
    }
}
