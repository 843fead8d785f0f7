//! Tool catalog: name/tag/category indexing, registration, and hot-reload
//! notifications (§4.5).

use crate::manifest::{self, ToolManifest};
use crate::tool::Tool;
use async_trait::async_trait;
use conductor_protocol::{RepositoryError, ToolId, ToolRepository, ToolStatus, ToolSummary};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

/// Published on hot reload or explicit mutation (§4.5 `subscribe`).
#[derive(Debug, Clone)]
pub enum ToolEvent {
    /// A tool was newly registered.
    Registered(ToolId),
    /// An existing tool's manifest or status changed.
    Updated(ToolId),
    /// A tool was removed from the index.
    Removed(ToolId),
}

/// The tool catalog: a name-keyed index plus tag/category secondary
/// indexes, with a hot-reload event channel.
pub struct ToolRegistry {
    by_id: RwLock<HashMap<ToolId, Tool>>,
    by_name: RwLock<HashMap<String, ToolId>>,
    events: broadcast::Sender<ToolEvent>,
}

impl ToolRegistry {
    /// Build an empty registry.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self { by_id: RwLock::new(HashMap::new()), by_name: RwLock::new(HashMap::new()), events }
    }

    /// Scan `dir` once, parsing every manifest file found directly within
    /// it, and register each as a new tool (§4.5 `load`).
    pub async fn load_directory(&self, dir: &std::path::Path) -> Result<usize, crate::error::ManifestError> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut loaded = 0;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let source = tokio::fs::read_to_string(entry.path()).await?;
            match manifest::parse(&source) {
                Ok(parsed) => {
                    self.register(parsed).await;
                    loaded += 1;
                }
                Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping unparsable tool manifest"),
            }
        }
        Ok(loaded)
    }

    /// Register a freshly parsed manifest as a new tool, or replace the
    /// existing tool of the same name in place (§4.5 `register`).
    pub async fn register(&self, manifest: ToolManifest) -> ToolId {
        let mut by_name = self.by_name.write().await;
        let mut by_id = self.by_id.write().await;

        if let Some(existing_id) = by_name.get(&manifest.name).cloned() {
            let tool = Tool::from_manifest(existing_id.clone(), manifest);
            by_id.insert(existing_id.clone(), tool);
            info!(tool_id = %existing_id, "tool manifest re-indexed");
            let _ = self.events.send(ToolEvent::Updated(existing_id.clone()));
            return existing_id;
        }

        let id = ToolId::new(Uuid::new_v4().to_string());
        by_name.insert(manifest.name.clone(), id.clone());
        let tool = Tool::from_manifest(id.clone(), manifest);
        by_id.insert(id.clone(), tool);
        info!(tool_id = %id, "tool registered");
        let _ = self.events.send(ToolEvent::Registered(id.clone()));
        id
    }

    /// Look up a tool by name (§4.5 `get`).
    pub async fn get_by_name(&self, name: &str) -> Option<Tool> {
        let by_name = self.by_name.read().await;
        let id = by_name.get(name)?;
        self.by_id.read().await.get(id).cloned()
    }

    /// Look up a tool by id.
    pub async fn get_by_id(&self, id: &ToolId) -> Option<Tool> {
        self.by_id.read().await.get(id).cloned()
    }

    /// Remove a tool from the index entirely.
    pub async fn remove(&self, id: &ToolId) -> bool {
        let mut by_id = self.by_id.write().await;
        if let Some(tool) = by_id.remove(id) {
            self.by_name.write().await.remove(&tool.name);
            let _ = self.events.send(ToolEvent::Removed(id.clone()));
            true
        } else {
            false
        }
    }

    /// Record a successful call against a tool's usage counter (supplement
    /// to §4.5, surfaced through `conductor-knowledge`'s `summarize`).
    pub async fn record_usage(&self, id: &ToolId) {
        if let Some(tool) = self.by_id.write().await.get_mut(id) {
            tool.usage_counter += 1;
        }
    }

    /// Tools whose tags contain `tag`.
    pub async fn find_by_tag(&self, tag: &str) -> Vec<Tool> {
        self.by_id.read().await.values().filter(|t| t.tags.iter().any(|t2| t2 == tag)).cloned().collect()
    }

    /// Tools in the given category.
    pub async fn find_by_category(&self, category: &str) -> Vec<Tool> {
        self.by_id.read().await.values().filter(|t| t.category == category).cloned().collect()
    }

    /// Subscribe to hot-reload/mutation events (§4.5 `subscribe`).
    pub fn subscribe(&self) -> broadcast::Receiver<ToolEvent> {
        self.events.subscribe()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRepository for ToolRegistry {
    async fn find(&self, id: &ToolId) -> Result<Option<ToolSummary>, RepositoryError> {
        Ok(self.get_by_id(id).await.map(|t| t.to_summary()))
    }

    async fn find_compatible_published(&self, failing: &ToolId) -> Result<Vec<ToolSummary>, RepositoryError> {
        let by_id = self.by_id.read().await;
        let target_param_count = by_id.get(failing).map(|t| t.parameters.len());
        Ok(by_id
            .values()
            .filter(|t| {
                &t.id != failing
                    && t.status == ToolStatus::Published
                    && target_param_count.is_none_or(|n| t.parameters.len() == n)
            })
            .map(Tool::to_summary)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(name: &str) -> ToolManifest {
        ToolManifest {
            name: name.into(),
            version: "1.0.0".into(),
            description: "d".into(),
            category: "search".into(),
            tags: vec!["web".into()],
            parameters: vec![],
            returns: serde_json::Value::Null,
            entry: conductor_protocol::ToolEntryKind::Builtin { handler: "h".into() },
            concurrency: None,
        }
    }

    #[tokio::test]
    async fn register_then_lookup_by_name_and_id() {
        let registry = ToolRegistry::new();
        let id = registry.register(manifest("search")).await;
        let by_name = registry.get_by_name("search").await.unwrap();
        assert_eq!(by_name.id, id);
    }

    #[tokio::test]
    async fn re_registering_same_name_updates_in_place() {
        let registry = ToolRegistry::new();
        let id1 = registry.register(manifest("search")).await;
        let id2 = registry.register(manifest("search")).await;
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn subscribe_observes_registration_event() {
        let registry = ToolRegistry::new();
        let mut rx = registry.subscribe();
        registry.register(manifest("search")).await;
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ToolEvent::Registered(_)));
    }

    #[tokio::test]
    async fn remove_drops_both_indexes() {
        let registry = ToolRegistry::new();
        let id = registry.register(manifest("search")).await;
        assert!(registry.remove(&id).await);
        assert!(registry.get_by_name("search").await.is_none());
    }
}
