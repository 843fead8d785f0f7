//! # conductor-state-memory — in-memory repository adapters
//!
//! `RwLock<HashMap<...>>`-backed [`WorkflowRepository`] and
//! [`ToolRepository`] implementations, for development and single-process
//! deployments where persistence across restarts isn't required. No
//! search, no durability — the same tradeoffs the teacher's own
//! in-memory state store makes.

#![deny(missing_docs)]

use async_trait::async_trait;
use conductor_protocol::{RepositoryError, ToolId, ToolRepository, ToolStatus, ToolSummary, WorkflowId, WorkflowRepository};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory workflow store keyed by [`WorkflowId`].
///
/// Workflows are stored as the raw JSON the caller already validated
/// (§4.1 — validation happens before the call reaches this trait, not
/// inside it).
#[derive(Default)]
pub struct MemoryWorkflowStore {
    workflows: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryWorkflowStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn workflow_id(workflow: &serde_json::Value) -> Result<String, RepositoryError> {
    workflow
        .get("id")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| RepositoryError::Unavailable("workflow JSON has no \"id\" field".into()))
}

#[async_trait]
impl WorkflowRepository for MemoryWorkflowStore {
    async fn save(&self, workflow: serde_json::Value) -> Result<(), RepositoryError> {
        let id = workflow_id(&workflow)?;
        self.workflows.write().await.insert(id, workflow);
        Ok(())
    }

    async fn load(&self, id: &WorkflowId) -> Result<serde_json::Value, RepositoryError> {
        self.workflows
            .read()
            .await
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}

/// In-memory tool registry store keyed by [`ToolId`].
#[derive(Default)]
pub struct MemoryToolStore {
    tools: RwLock<HashMap<String, ToolSummary>>,
}

impl MemoryToolStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tool summary, for composition-root seeding.
    pub async fn put(&self, tool: ToolSummary) {
        self.tools.write().await.insert(tool.id.to_string(), tool);
    }
}

#[async_trait]
impl ToolRepository for MemoryToolStore {
    async fn find(&self, id: &ToolId) -> Result<Option<ToolSummary>, RepositoryError> {
        Ok(self.tools.read().await.get(id.as_str()).cloned())
    }

    async fn find_compatible_published(&self, failing: &ToolId) -> Result<Vec<ToolSummary>, RepositoryError> {
        let tools = self.tools.read().await;
        let target_param_count = tools.get(failing.as_str()).map(|t| t.parameters.len());
        Ok(tools
            .values()
            .filter(|t| {
                &t.id != failing
                    && t.status == ToolStatus::Published
                    && target_param_count.is_none_or(|n| t.parameters.len() == n)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_protocol::ToolEntryKind;

    fn tool(id: &str, status: ToolStatus, params: usize) -> ToolSummary {
        ToolSummary {
            id: ToolId::from(id),
            name: id.to_owned(),
            status,
            parameters: (0..params)
                .map(|i| conductor_protocol::ToolParam {
                    name: format!("p{i}"),
                    param_type: conductor_protocol::ToolParamType::String,
                    required: true,
                    default: None,
                    enum_values: None,
                })
                .collect(),
            entry: ToolEntryKind::Builtin { handler: "noop".into() },
        }
    }

    #[tokio::test]
    async fn saves_and_loads_by_id() {
        let store = MemoryWorkflowStore::new();
        store.save(serde_json::json!({"id": "wf1", "name": "x"})).await.unwrap();
        let loaded = store.load(&WorkflowId::from("wf1")).await.unwrap();
        assert_eq!(loaded["name"], "x");
    }

    #[tokio::test]
    async fn load_missing_workflow_errors() {
        let store = MemoryWorkflowStore::new();
        assert!(store.load(&WorkflowId::from("nope")).await.is_err());
    }

    #[tokio::test]
    async fn finds_compatible_published_tools_by_matching_param_count() {
        let store = MemoryToolStore::new();
        store.put(tool("a", ToolStatus::Published, 2)).await;
        store.put(tool("b", ToolStatus::Published, 2)).await;
        store.put(tool("c", ToolStatus::Draft, 2)).await;
        store.put(tool("failing", ToolStatus::Deprecated, 2)).await;

        let compatible = store.find_compatible_published(&ToolId::from("failing")).await.unwrap();
        let names: Vec<_> = compatible.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
