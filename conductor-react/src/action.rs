//! The ReAct action format (§6 "ReAct action format") — the LM output
//! contract, already coerced into a closed Rust sum type.

use conductor_protocol::NodeId;
use serde::{Deserialize, Serialize};

/// One decision the loop can make on an iteration.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Record reasoning text without touching the graph.
    Reason {
        /// Free-text reasoning to append to the message log.
        reasoning: Option<String>,
    },
    /// Run one node to completion.
    ExecuteNode {
        /// The node to run.
        node_id: NodeId,
        /// Parameters forwarded to the node, if any.
        params: Option<serde_json::Value>,
        /// Per-node retry override.
        retry_count: Option<u32>,
    },
    /// Suspend the loop pending an external signal.
    Wait,
    /// Terminate the loop successfully.
    Finish,
    /// Re-run a node outside the executed-nodes guard, after a failure.
    ErrorRecovery {
        /// The node to retry.
        node_id: NodeId,
        /// The reason the prior attempt failed, echoed into the observation.
        reasoning: Option<String>,
    },
}

impl Action {
    /// The wire tag for this action's `type` field.
    pub fn tag(&self) -> &'static str {
        match self {
            Action::Reason { .. } => "reason",
            Action::ExecuteNode { .. } => "execute_node",
            Action::Wait => "wait",
            Action::Finish => "finish",
            Action::ErrorRecovery { .. } => "error_recovery",
        }
    }

    /// The node this action targets, if any.
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            Action::ExecuteNode { node_id, .. } | Action::ErrorRecovery { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}
