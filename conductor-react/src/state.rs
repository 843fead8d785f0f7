//! The ReAct loop's own state (§3 "ReAct loop state", §5 "the ReAct loop
//! state is not shared" — no lock needed, one loop runs on one task).

use conductor_protocol::{LmMessage, NodeId};
use std::collections::HashMap;

/// Where a loop currently stands.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    /// Actively iterating.
    Running,
    /// Terminated via `finish`.
    Completed,
    /// Terminated via exhausted parse attempts or an unrecoverable node error.
    Failed,
    /// Suspended on `wait`, pending an external resume signal.
    Suspended,
}

/// The accumulated state of one ReAct run.
#[derive(Debug, Clone)]
pub struct LoopState {
    /// Current lifecycle status.
    pub status: LoopStatus,
    /// Number of iterations completed so far.
    pub iteration_count: u32,
    /// Upper bound on iterations (precondition for starting a new one).
    pub max_iterations: u32,
    /// Current step counter (each reasoning/act/observe cycle advances it).
    pub current_step: u32,
    /// Upper bound on steps.
    pub max_steps: u32,
    /// The conversation sent to the LM client, growing each iteration.
    pub messages: Vec<LmMessage>,
    /// Node ids the workflow makes available for execution this run.
    pub available_nodes: Vec<NodeId>,
    /// Nodes already executed, keyed by id, holding their recorded output.
    pub executed_nodes: HashMap<NodeId, serde_json::Value>,
}

impl LoopState {
    /// Start a fresh loop over the given available nodes.
    pub fn new(available_nodes: Vec<NodeId>, max_iterations: u32, max_steps: u32) -> Self {
        Self {
            status: LoopStatus::Running,
            iteration_count: 0,
            max_iterations,
            current_step: 0,
            max_steps,
            messages: Vec::new(),
            available_nodes,
            executed_nodes: HashMap::new(),
        }
    }

    /// Whether a new iteration may begin (§4.3 "Pre:").
    pub fn can_iterate(&self) -> bool {
        self.status == LoopStatus::Running
            && self.iteration_count < self.max_iterations
            && self.current_step <= self.max_steps
    }
}
