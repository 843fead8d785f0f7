//! System prompt and retry-prompt construction (§4.3 step 1 and step 2).

use crate::state::LoopState;
use conductor_protocol::WorkflowId;

/// One literal JSON exemplar per action kind, enumerated in the system prompt.
const ACTION_EXEMPLARS: &[(&str, &str)] = &[
    ("reason", r#"{"type": "reason", "reasoning": "..."}"#),
    ("execute_node", r#"{"type": "execute_node", "node_id": "n1", "params": {}}"#),
    ("wait", r#"{"type": "wait"}"#),
    ("finish", r#"{"type": "finish"}"#),
    ("error_recovery", r#"{"type": "error_recovery", "node_id": "n1", "reasoning": "..."}"#),
];

/// Build the system prompt for one reasoning call (§4.3 step 1).
pub fn system_prompt(workflow_id: &WorkflowId, workflow_name: &str, state: &LoopState) -> String {
    let exemplars: String = ACTION_EXEMPLARS
        .iter()
        .map(|(kind, json)| format!("  - {kind}: {json}"))
        .collect::<Vec<_>>()
        .join("\n");

    let available: String =
        state.available_nodes.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ");
    let executed: String =
        state.executed_nodes.keys().map(|id| id.to_string()).collect::<Vec<_>>().join(", ");

    format!(
        "Workflow: {workflow_name} ({workflow_id})\n\
         \n\
         Respond with exactly one JSON object (not an array) with a required \"type\" field.\n\
         Allowed action kinds:\n{exemplars}\n\
         \n\
         Rules:\n\
         - \"node_id\" is required for execute_node and error_recovery.\n\
         - A node may be executed at most once (executed_nodes), except via error_recovery.\n\
         - current_step must not exceed {max_steps}; once reached, only finish is accepted.\n\
         \n\
         Available nodes: [{available}]\n\
         Executed nodes: [{executed}]\n\
         Step {current_step} of {max_steps}.",
        max_steps = state.max_steps,
        current_step = state.current_step,
    )
}

/// Build a retry prompt appended after a stage A/B/C parse failure
/// (§4.3 step 2 — "retry-prompt built from the available-nodes list and
/// the attempt counter").
pub fn retry_prompt(state: &LoopState, attempt: u32, reason: &str) -> String {
    let available: String =
        state.available_nodes.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ");
    format!(
        "Your previous response was rejected (attempt {attempt} of 3): {reason}\n\
         Respond again with exactly one valid JSON action object. Available nodes: [{available}]"
    )
}
