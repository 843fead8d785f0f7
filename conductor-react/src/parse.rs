//! Three-stage parse-and-validate pipeline for LM output (§4.3 step 2).
//!
//! Stage A decodes the raw completion as a single JSON object. Stage B
//! coerces that object into an [`Action`], rejecting unknown tags and
//! malformed fields. Stage C checks the coerced action against the
//! running [`LoopState`] (node exists, not already executed, step
//! budget not exhausted). Each stage fails independently so the
//! orchestrator can report which one rejected the response.

use crate::action::Action;
use crate::state::LoopState;
use conductor_protocol::NodeId;
use serde_json::Value;
use thiserror::Error;

/// Why a parse attempt was rejected.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    /// The completion was not valid JSON at all.
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    /// The completion parsed but was not a JSON object.
    #[error("response must be a JSON object, not {0}")]
    NotAnObject(&'static str),
    /// The `type` field was missing.
    #[error("missing required field \"type\"")]
    MissingType,
    /// The `type` field named an action kind we don't recognize.
    #[error("unknown action type \"{0}\"")]
    UnknownType(String),
    /// A field required by this action kind was absent or malformed.
    #[error("action \"{action}\" requires field \"{field}\"")]
    MissingField {
        /// The action tag being decoded.
        action: &'static str,
        /// The missing or malformed field.
        field: &'static str,
    },
    /// `retry_count` was present but negative.
    #[error("retry_count must not be negative")]
    NegativeRetryCount,
    /// `execute_node`/`error_recovery` named a node outside `available_nodes`.
    #[error("node \"{0}\" is not available in this workflow")]
    UnknownNode(NodeId),
    /// `execute_node` named a node already recorded in `executed_nodes`.
    #[error("node \"{0}\" has already been executed; use error_recovery to retry it")]
    NodeAlreadyExecuted(NodeId),
    /// The step budget is exhausted and the action was not `finish`.
    #[error("step budget exhausted; only finish is accepted")]
    StepBudgetExceeded,
}

/// Run stage A: decode raw LM output as a JSON object.
pub fn stage_a_decode(raw: &str) -> Result<Value, ParseError> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    match &value {
        Value::Object(_) => Ok(value),
        Value::Array(_) => Err(ParseError::NotAnObject("an array")),
        Value::String(_) => Err(ParseError::NotAnObject("a string")),
        Value::Number(_) => Err(ParseError::NotAnObject("a number")),
        Value::Bool(_) => Err(ParseError::NotAnObject("a boolean")),
        Value::Null => Err(ParseError::NotAnObject("null")),
    }
}

/// Run stage B: coerce the decoded object into an [`Action`].
///
/// Deliberately hand-rolled rather than `#[serde(tag = "type")]` on
/// [`Action`] directly: we want a named [`ParseError`] per failure mode
/// instead of serde's single untyped deserialize error.
pub fn stage_b_coerce(value: &Value) -> Result<Action, ParseError> {
    let obj = value.as_object().ok_or(ParseError::NotAnObject("not an object"))?;
    let tag = obj.get("type").and_then(Value::as_str).ok_or(ParseError::MissingType)?;

    let node_id = |action: &'static str| -> Result<NodeId, ParseError> {
        obj.get("node_id")
            .and_then(Value::as_str)
            .map(NodeId::from)
            .ok_or(ParseError::MissingField { action, field: "node_id" })
    };
    let reasoning =
        || obj.get("reasoning").and_then(Value::as_str).map(str::to_owned);
    let retry_count = |action: &'static str| -> Result<Option<u32>, ParseError> {
        match obj.get("retry_count") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => {
                let i = n.as_i64().ok_or(ParseError::MissingField { action, field: "retry_count" })?;
                if i < 0 {
                    Err(ParseError::NegativeRetryCount)
                } else {
                    Ok(Some(i as u32))
                }
            }
            Some(_) => Err(ParseError::MissingField { action, field: "retry_count" }),
        }
    };

    match tag {
        "reason" => Ok(Action::Reason { reasoning: reasoning() }),
        "execute_node" => Ok(Action::ExecuteNode {
            node_id: node_id("execute_node")?,
            params: obj.get("params").cloned(),
            retry_count: retry_count("execute_node")?,
        }),
        "wait" => Ok(Action::Wait),
        "finish" => Ok(Action::Finish),
        "error_recovery" => Ok(Action::ErrorRecovery {
            node_id: node_id("error_recovery")?,
            reasoning: reasoning(),
        }),
        other => Err(ParseError::UnknownType(other.to_owned())),
    }
}

/// Run stage C: business rules against the current [`LoopState`].
pub fn stage_c_validate(action: &Action, state: &LoopState) -> Result<(), ParseError> {
    if state.current_step >= state.max_steps && !matches!(action, Action::Finish) {
        return Err(ParseError::StepBudgetExceeded);
    }
    match action {
        Action::ExecuteNode { node_id, .. } => {
            if !state.available_nodes.contains(node_id) {
                return Err(ParseError::UnknownNode(node_id.clone()));
            }
            if state.executed_nodes.contains_key(node_id) {
                return Err(ParseError::NodeAlreadyExecuted(node_id.clone()));
            }
            Ok(())
        }
        Action::ErrorRecovery { node_id, .. } => {
            if !state.available_nodes.contains(node_id) {
                return Err(ParseError::UnknownNode(node_id.clone()));
            }
            Ok(())
        }
        Action::Reason { .. } | Action::Wait | Action::Finish => Ok(()),
    }
}

/// Run all three stages against a single LM completion.
pub fn parse_action(raw: &str, state: &LoopState) -> Result<Action, ParseError> {
    let value = stage_a_decode(raw)?;
    let action = stage_b_coerce(&value)?;
    stage_c_validate(&action, state)?;
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> LoopState {
        LoopState::new(vec![NodeId::from("n1"), NodeId::from("n2")], 10, 10)
    }

    #[test]
    fn decodes_a_well_formed_action() {
        let action = parse_action(r#"{"type": "finish"}"#, &state()).unwrap();
        assert_eq!(action, Action::Finish);
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(parse_action("not json", &state()), Err(ParseError::InvalidJson(_))));
    }

    #[test]
    fn rejects_array_top_level() {
        assert!(matches!(parse_action("[1,2]", &state()), Err(ParseError::NotAnObject(_))));
    }

    #[test]
    fn rejects_missing_type() {
        assert!(matches!(parse_action(r#"{"foo": 1}"#, &state()), Err(ParseError::MissingType)));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = parse_action(r#"{"type": "bogus"}"#, &state());
        assert!(matches!(err, Err(ParseError::UnknownType(t)) if t == "bogus"));
    }

    #[test]
    fn execute_node_requires_node_id() {
        let err = parse_action(r#"{"type": "execute_node"}"#, &state());
        assert!(matches!(err, Err(ParseError::MissingField { action: "execute_node", field: "node_id" })));
    }

    #[test]
    fn rejects_negative_retry_count() {
        let err = parse_action(
            r#"{"type": "execute_node", "node_id": "n1", "retry_count": -1}"#,
            &state(),
        );
        assert!(matches!(err, Err(ParseError::NegativeRetryCount)));
    }

    #[test]
    fn rejects_node_outside_available_set() {
        let err = parse_action(r#"{"type": "execute_node", "node_id": "n9"}"#, &state());
        assert!(matches!(err, Err(ParseError::UnknownNode(_))));
    }

    #[test]
    fn rejects_already_executed_node() {
        let mut s = state();
        s.executed_nodes.insert(NodeId::from("n1"), serde_json::json!(null));
        let err = parse_action(r#"{"type": "execute_node", "node_id": "n1"}"#, &s);
        assert!(matches!(err, Err(ParseError::NodeAlreadyExecuted(_))));
    }

    #[test]
    fn error_recovery_bypasses_the_executed_guard() {
        let mut s = state();
        s.executed_nodes.insert(NodeId::from("n1"), serde_json::json!(null));
        let action = parse_action(r#"{"type": "error_recovery", "node_id": "n1"}"#, &s).unwrap();
        assert_eq!(action.node_id(), Some(&NodeId::from("n1")));
    }

    #[test]
    fn only_finish_is_accepted_once_the_step_budget_is_exhausted() {
        let mut s = state();
        s.current_step = s.max_steps;
        assert!(parse_action(r#"{"type": "finish"}"#, &s).is_ok());
        assert!(matches!(
            parse_action(r#"{"type": "wait"}"#, &s),
            Err(ParseError::StepBudgetExceeded)
        ));
    }
}
