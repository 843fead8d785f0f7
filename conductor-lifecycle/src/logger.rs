//! The execution logger: a bounded ring of structured entries, sibling to
//! the lifecycle manager (§4.9 "Execution logger").

use conductor_protocol::AgentId;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// The closed set of entry kinds the logger accepts.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A resource reservation or release.
    ResourceAllocation,
    /// A lifecycle state-machine transition.
    StateChange,
    /// A spawn/terminate/restart call.
    LifecycleOperation,
}

/// One logged event.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Unix millis when the entry was recorded.
    pub timestamp_ms: u64,
    /// The agent instance this entry concerns.
    pub agent_id: AgentId,
    /// The entry's kind.
    pub kind: EntryKind,
    /// Arbitrary JSON-encodable detail, shape depending on `kind`.
    pub detail: serde_json::Value,
}

/// A bounded, append-only ring of [`LogEntry`] records (Supplemented
/// feature: `to_json_lines` export, for offline inspection/audit).
pub struct ExecutionLogger {
    entries: RwLock<VecDeque<LogEntry>>,
    capacity: usize,
}

impl ExecutionLogger {
    /// Build a logger that retains at most `capacity` entries, dropping
    /// the oldest on overflow.
    pub fn new(capacity: usize) -> Self {
        Self { entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))), capacity }
    }

    /// Append an entry, evicting the oldest if at capacity.
    pub async fn record(&self, agent_id: AgentId, kind: EntryKind, detail: serde_json::Value) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(LogEntry { timestamp_ms: now_ms(), agent_id, kind, detail });
    }

    /// Entries matching an optional agent id filter and/or entry kind filter.
    pub async fn filter(&self, agent_id: Option<&AgentId>, kind: Option<EntryKind>) -> Vec<LogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| agent_id.is_none_or(|id| &e.agent_id == id))
            .filter(|e| kind.is_none_or(|k| e.kind == k))
            .cloned()
            .collect()
    }

    /// Export every retained entry as newline-delimited JSON.
    pub async fn to_json_lines(&self) -> String {
        self.entries
            .read()
            .await
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drops_oldest_entry_on_overflow() {
        let logger = ExecutionLogger::new(2);
        let agent = AgentId::from("a1");
        logger.record(agent.clone(), EntryKind::StateChange, serde_json::json!({"n": 1})).await;
        logger.record(agent.clone(), EntryKind::StateChange, serde_json::json!({"n": 2})).await;
        logger.record(agent.clone(), EntryKind::StateChange, serde_json::json!({"n": 3})).await;

        let entries = logger.filter(None, None).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].detail["n"], 2);
        assert_eq!(entries[1].detail["n"], 3);
    }

    #[tokio::test]
    async fn filters_by_agent_and_kind() {
        let logger = ExecutionLogger::new(10);
        logger
            .record(AgentId::from("a1"), EntryKind::StateChange, serde_json::json!({}))
            .await;
        logger
            .record(AgentId::from("a2"), EntryKind::ResourceAllocation, serde_json::json!({}))
            .await;

        let a1_only = logger.filter(Some(&AgentId::from("a1")), None).await;
        assert_eq!(a1_only.len(), 1);

        let allocations_only = logger.filter(None, Some(EntryKind::ResourceAllocation)).await;
        assert_eq!(allocations_only.len(), 1);
    }

    #[tokio::test]
    async fn exports_one_json_object_per_line() {
        let logger = ExecutionLogger::new(10);
        logger
            .record(AgentId::from("a1"), EntryKind::LifecycleOperation, serde_json::json!({"op": "spawn"}))
            .await;
        logger
            .record(AgentId::from("a1"), EntryKind::StateChange, serde_json::json!({"to": "running"}))
            .await;

        let lines: Vec<_> = logger.to_json_lines().await.lines().map(str::to_owned).collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert!(serde_json::from_str::<serde_json::Value>(line).is_ok());
        }
    }
}
