//! The typed wire protocol a canvas client sends and receives (§6 "Canvas
//! wire protocol", §4.10 "Typed messages").

use crate::snapshot::{CanvasDiff, EdgeSnapshot, NodeSnapshot, Position};
use conductor_protocol::{ConfirmId, EdgeId, ErrorKind, NodeId, RunId, WorkflowId};
use serde::{Deserialize, Serialize};

/// Terminal/in-flight status of one node execution, carried on `execution_status`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatusKind {
    /// The node is executing.
    Running,
    /// The node finished successfully.
    Completed,
    /// The node failed.
    Failed,
}

/// A caller's decision on a `workflow_confirm_required` handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmDecision {
    /// Proceed with execution.
    Allow,
    /// Abort; a terminal `workflow_error` follows.
    Deny,
}

/// Every server-to-client message kind the fabric emits (§4.10).
///
/// All variants carry `workflow_id` and `timestamp`; variants describing a
/// state change also carry `message_id` so they can be tracked for
/// acknowledgement (§4.10 "Reliable messages").
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanvasMessage {
    /// Full canvas state, sent on subscribe when requested.
    InitialState {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// Current nodes.
        nodes: Vec<NodeSnapshot>,
        /// Current edges.
        edges: Vec<EdgeSnapshot>,
    },
    /// Full canvas state, sent on demand (not necessarily at subscribe time).
    CanvasSnapshot {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// Current nodes.
        nodes: Vec<NodeSnapshot>,
        /// Current edges.
        edges: Vec<EdgeSnapshot>,
    },
    /// A node was added to the graph.
    NodeCreated {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// Unique id for delivery tracking (§4.10 "Reliable messages").
        message_id: String,
        /// The created node's id.
        node_id: NodeId,
        /// The created node's kind tag.
        node_type: String,
        /// Where it was placed.
        position: Position,
        /// Its initial config/data.
        config: serde_json::Value,
    },
    /// One or more fields of a node changed.
    NodeUpdated {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// Unique id for delivery tracking.
        message_id: String,
        /// The updated node's id.
        node_id: NodeId,
        /// The fields that changed.
        changes: serde_json::Value,
    },
    /// A node was removed from the graph.
    NodeDeleted {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// Unique id for delivery tracking.
        message_id: String,
        /// The removed node's id.
        node_id: NodeId,
    },
    /// A node's position changed (a dedicated message so clients can
    /// animate drag operations without paying the full `node_updated` diff).
    NodeMoved {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// Unique id for delivery tracking.
        message_id: String,
        /// The node that moved.
        node_id: NodeId,
        /// Its new position.
        position: Position,
    },
    /// An edge was added.
    EdgeCreated {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// Unique id for delivery tracking.
        message_id: String,
        /// The created edge's id.
        edge_id: EdgeId,
        /// The edge's source node.
        source_id: NodeId,
        /// The edge's target node.
        target_id: NodeId,
    },
    /// An edge was removed.
    EdgeDeleted {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// Unique id for delivery tracking.
        message_id: String,
        /// The removed edge's id.
        edge_id: EdgeId,
    },
    /// A node's execution reached a new status.
    ExecutionStatus {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// The run this status belongs to.
        run_id: RunId,
        /// The node whose status changed.
        node_id: NodeId,
        /// The new status.
        status: ExecutionStatusKind,
        /// Present when `status` is `completed`.
        #[serde(skip_serializing_if = "Option::is_none")]
        outputs: Option<serde_json::Value>,
        /// Present when `status` is `failed`.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A workflow run began.
    WorkflowStarted {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// The run that started.
        run_id: RunId,
    },
    /// A workflow run finished successfully.
    WorkflowCompleted {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// The run that completed.
        run_id: RunId,
        /// The run's final output.
        outputs: serde_json::Value,
    },
    /// A workflow run failed terminally.
    WorkflowError {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// The run that failed, if one had started.
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<RunId>,
        /// The machine-readable failure kind.
        error_type: ErrorKind,
        /// A developer-readable message.
        error: String,
    },
    /// A self-repair attempt (C7) began.
    WorkflowReactLoopStarted {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// 1-indexed attempt number.
        attempt: u32,
    },
    /// A self-repair patch was applied and the workflow was re-validated.
    WorkflowReactPatchApplied {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// 1-indexed attempt number that produced this patch.
        attempt: u32,
        /// A developer-readable description of the patch.
        patch: String,
    },
    /// One self-repair attempt failed but another will be tried.
    WorkflowAttemptFailed {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// 1-indexed attempt number that failed.
        attempt: u32,
        /// The machine-readable failure kind.
        error_type: ErrorKind,
        /// A developer-readable message.
        error: String,
    },
    /// Self-repair gave up; carries the final accounting.
    WorkflowTerminationReport {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// Why self-repair stopped.
        stop_reason: String,
        /// Total attempts made.
        attempts_total: u32,
    },
    /// A run-confirmation handshake is required before the first attempt.
    WorkflowConfirmRequired {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// The handshake's identifier.
        confirm_id: ConfirmId,
    },
    /// A caller resolved a `workflow_confirm_required` handshake.
    WorkflowConfirmed {
        /// The workflow this message concerns.
        workflow_id: WorkflowId,
        /// Unix millis when the message was produced.
        timestamp: u64,
        /// The handshake being resolved.
        confirm_id: ConfirmId,
        /// The caller's decision.
        decision: ConfirmDecision,
    },
    /// Client acknowledgement of a reliable message.
    Ack {
        /// The message id being acknowledged.
        message_id: String,
    },
}

impl CanvasMessage {
    /// The `message_id` carried by reliable-delivery variants, if any.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            CanvasMessage::NodeCreated { message_id, .. }
            | CanvasMessage::NodeUpdated { message_id, .. }
            | CanvasMessage::NodeDeleted { message_id, .. }
            | CanvasMessage::NodeMoved { message_id, .. }
            | CanvasMessage::EdgeCreated { message_id, .. }
            | CanvasMessage::EdgeDeleted { message_id, .. } => Some(message_id),
            _ => None,
        }
    }
}

/// Client-to-server actions (§6 "Canvas wire protocol").
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    /// Create a node.
    CreateNode {
        /// The node's id.
        node_id: NodeId,
        /// The node's kind tag.
        node_type: String,
        /// Its initial position.
        position: Position,
    },
    /// Update a node's config/data.
    UpdateNode {
        /// The node's id.
        node_id: NodeId,
        /// The fields changing.
        changes: serde_json::Value,
    },
    /// Remove a node.
    DeleteNode {
        /// The node's id.
        node_id: NodeId,
    },
    /// Reposition a node.
    MoveNode {
        /// The node's id.
        node_id: NodeId,
        /// Its new position.
        position: Position,
    },
    /// Create an edge.
    CreateEdge {
        /// The edge's id.
        edge_id: EdgeId,
        /// Source node.
        source_id: NodeId,
        /// Target node.
        target_id: NodeId,
    },
    /// Remove an edge.
    DeleteEdge {
        /// The edge's id.
        edge_id: EdgeId,
    },
    /// Begin a workflow run.
    StartExecution,
}

/// Convert a [`CanvasDiff`] to the linear sequence of typed messages a
/// client applies (§4.10 "A diff is converted to a linear sequence of
/// typed messages"). Empty diffs produce no messages.
pub fn diff_to_messages(
    workflow_id: &WorkflowId,
    diff: &CanvasDiff,
    timestamp: u64,
    mut next_message_id: impl FnMut() -> String,
) -> Vec<CanvasMessage> {
    let mut messages = Vec::new();

    for node in &diff.added_nodes {
        messages.push(CanvasMessage::NodeCreated {
            workflow_id: workflow_id.clone(),
            timestamp,
            message_id: next_message_id(),
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            position: node.position,
            config: node.data.clone(),
        });
    }
    for node_id in &diff.removed_nodes {
        messages.push(CanvasMessage::NodeDeleted {
            workflow_id: workflow_id.clone(),
            timestamp,
            message_id: next_message_id(),
            node_id: node_id.clone(),
        });
    }
    for modified in &diff.modified_nodes {
        messages.push(CanvasMessage::NodeUpdated {
            workflow_id: workflow_id.clone(),
            timestamp,
            message_id: next_message_id(),
            node_id: modified.id.clone(),
            changes: serde_json::to_value(&modified.changes).unwrap_or_default(),
        });
    }
    for edge in &diff.added_edges {
        messages.push(CanvasMessage::EdgeCreated {
            workflow_id: workflow_id.clone(),
            timestamp,
            message_id: next_message_id(),
            edge_id: edge.id.clone(),
            source_id: edge.source_id.clone(),
            target_id: edge.target_id.clone(),
        });
    }
    for edge_id in &diff.removed_edges {
        messages.push(CanvasMessage::EdgeDeleted {
            workflow_id: workflow_id.clone(),
            timestamp,
            message_id: next_message_id(),
            edge_id: edge_id.clone(),
        });
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{CanvasSnapshot, NodeSnapshot};

    #[test]
    fn empty_diff_produces_no_messages() {
        let messages = diff_to_messages(&WorkflowId::from("w1"), &CanvasDiff::default(), 0, || "m".into());
        assert!(messages.is_empty());
    }

    #[test]
    fn an_added_node_becomes_a_node_created_message() {
        let old = CanvasSnapshot::default();
        let new = CanvasSnapshot {
            nodes: vec![NodeSnapshot {
                id: NodeId::from("n1"),
                node_type: "default".into(),
                position: Position::default(),
                data: serde_json::json!({}),
            }],
            edges: vec![],
        };
        let d = crate::snapshot::diff(&old, &new);
        let mut counter = 0u32;
        let messages = diff_to_messages(&WorkflowId::from("w1"), &d, 0, || {
            counter += 1;
            format!("m{counter}")
        });
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], CanvasMessage::NodeCreated { .. }));
    }
}
