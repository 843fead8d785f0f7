//! Config-only patch proposals for the recoverable error set (§4.4 step 3).

use conductor_protocol::{ErrorKind, NodeId, ToolId, ToolRepository};
use conductor_workflow::Node;

/// The minimum timeout a `timeout` patch raises the failing node to.
const MIN_PATCHED_TIMEOUT_MS: u64 = 60_000;

/// A proposed, not-yet-applied config change to one node.
#[derive(Debug, Clone)]
pub enum Patch {
    /// Raise `config.timeout` on the failing node.
    IncreaseTimeout {
        /// The node to patch.
        node_id: NodeId,
        /// The new timeout, in milliseconds.
        new_timeout_ms: u64,
    },
    /// Swap `config.tool_id` on the failing node to a compatible replacement.
    SwapTool {
        /// The node to patch.
        node_id: NodeId,
        /// The replacement tool.
        new_tool_id: ToolId,
    },
}

impl Patch {
    /// Apply this patch's config change to the node it targets.
    pub fn apply(&self, node: &mut Node) {
        match self {
            Patch::IncreaseTimeout { new_timeout_ms, .. } => {
                if let Some(obj) = node.config.as_object_mut() {
                    obj.insert("timeout".into(), serde_json::json!(new_timeout_ms));
                } else {
                    node.config = serde_json::json!({ "timeout": new_timeout_ms });
                }
            }
            Patch::SwapTool { new_tool_id, .. } => {
                if let Some(obj) = node.config.as_object_mut() {
                    obj.insert("tool_id".into(), serde_json::json!(new_tool_id.as_str()));
                } else {
                    node.config = serde_json::json!({ "tool_id": new_tool_id.as_str() });
                }
            }
        }
    }

    /// The node this patch targets.
    pub fn node_id(&self) -> &NodeId {
        match self {
            Patch::IncreaseTimeout { node_id, .. } | Patch::SwapTool { node_id, .. } => node_id,
        }
    }
}

/// Propose a patch for a failing node, or `None` if this error kind isn't
/// in the recoverable set, or no compatible replacement exists.
pub async fn propose(
    node: &Node,
    error_type: ErrorKind,
    retryable: bool,
    tool_repo: &dyn ToolRepository,
) -> Option<Patch> {
    match error_type {
        ErrorKind::Timeout if retryable => {
            let current = node.timeout().as_millis();
            let new_timeout_ms = current.saturating_mul(2).max(MIN_PATCHED_TIMEOUT_MS);
            Some(Patch::IncreaseTimeout { node_id: node.id.clone(), new_timeout_ms })
        }
        ErrorKind::ToolNotFound => {
            let failing_tool_id =
                node.config.get("tool_id").and_then(serde_json::Value::as_str)?;
            let candidates = tool_repo
                .find_compatible_published(&ToolId::from(failing_tool_id))
                .await
                .ok()?;
            let replacement = candidates.into_iter().next()?;
            Some(Patch::SwapTool { node_id: node.id.clone(), new_tool_id: replacement.id })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_protocol::test_utils::InMemoryToolRepository;
    use conductor_protocol::{ToolEntryKind, ToolParam, ToolParamType, ToolStatus, ToolSummary};
    use conductor_workflow::Position;

    fn tool_node(tool_id: &str) -> Node {
        Node {
            id: NodeId::from("n1"),
            kind: conductor_protocol::NodeKind::Tool,
            config: serde_json::json!({ "tool_id": tool_id }),
            position: Position::default(),
            retry_count: 0,
        }
    }

    fn compatible_tool(id: &str) -> ToolSummary {
        ToolSummary {
            id: ToolId::from(id),
            name: id.into(),
            status: ToolStatus::Published,
            parameters: vec![ToolParam {
                name: "x".into(),
                param_type: ToolParamType::String,
                required: true,
                default: None,
                enum_values: None,
            }],
            entry: ToolEntryKind::Builtin { handler: "noop".into() },
        }
    }

    #[tokio::test]
    async fn timeout_patch_at_least_doubles_and_floors_at_60s() {
        let repo = InMemoryToolRepository::new(vec![]);
        let node = tool_node("t1");
        let patch = propose(&node, ErrorKind::Timeout, true, &repo).await.unwrap();
        match patch {
            Patch::IncreaseTimeout { new_timeout_ms, .. } => assert_eq!(new_timeout_ms, 60_000),
            _ => panic!("expected IncreaseTimeout"),
        }
    }

    #[tokio::test]
    async fn non_retryable_timeout_has_no_patch() {
        let repo = InMemoryToolRepository::new(vec![]);
        let node = tool_node("t1");
        assert!(propose(&node, ErrorKind::Timeout, false, &repo).await.is_none());
    }

    #[tokio::test]
    async fn tool_not_found_swaps_to_a_compatible_replacement() {
        let repo = InMemoryToolRepository::new(vec![compatible_tool("replacement")]);
        let node = tool_node("missing");
        let patch = propose(&node, ErrorKind::ToolNotFound, false, &repo).await.unwrap();
        match patch {
            Patch::SwapTool { new_tool_id, .. } => assert_eq!(new_tool_id.as_str(), "replacement"),
            _ => panic!("expected SwapTool"),
        }
    }

    #[tokio::test]
    async fn tool_not_found_gives_up_when_nothing_compatible() {
        let repo = InMemoryToolRepository::new(vec![]);
        let node = tool_node("missing");
        assert!(propose(&node, ErrorKind::ToolNotFound, false, &repo).await.is_none());
    }
}
