//! The append-only tool-call audit log (§4.8, C2).

use crate::record::{CallFilter, CallSummary, ToolCallRecord};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Boundary the rest of the runtime appends and queries through. Kept
/// independent of any concrete backend so `conductor-tool`'s registry and
/// `conductor-react`'s loop can both depend on just this trait.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append a record. Never mutates or removes existing records, aside
    /// from the bounded implementation's drop-oldest overflow policy.
    async fn record(&self, record: ToolCallRecord);

    /// Query matching records, most recent first.
    async fn get_calls(&self, filter: &CallFilter) -> Vec<ToolCallRecord>;

    /// Aggregate counts and latency percentiles over matching records.
    async fn summarize(&self, filter: &CallFilter) -> CallSummary;
}

/// An [`AuditStore`] backed by a bounded in-memory ring buffer. Once
/// `capacity` is reached, the oldest 10% is trimmed to make room — the
/// same drop-oldest overflow policy used by the canvas fabric's dedup
/// ring (§8 "boundary behavior").
pub struct InMemoryAuditStore {
    records: RwLock<VecDeque<ToolCallRecord>>,
    capacity: usize,
}

impl InMemoryAuditStore {
    /// Default ceiling, matching the canvas dedup ring's default.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// Build a store with the given capacity ceiling.
    pub fn new(capacity: usize) -> Self {
        Self { records: RwLock::new(VecDeque::with_capacity(capacity.min(1024))), capacity }
    }
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn record(&self, record: ToolCallRecord) {
        let mut records = self.records.write().await;
        if records.len() >= self.capacity {
            let trim = (self.capacity / 10).max(1);
            warn!(trim, capacity = self.capacity, "audit log at capacity, dropping oldest records");
            for _ in 0..trim {
                records.pop_front();
            }
        }
        debug!(tool_name = %record.tool_name, "recorded tool call");
        records.push_back(record);
    }

    async fn get_calls(&self, filter: &CallFilter) -> Vec<ToolCallRecord> {
        let records = self.records.read().await;
        filter.apply(records.iter()).into_iter().cloned().collect()
    }

    async fn summarize(&self, filter: &CallFilter) -> CallSummary {
        let records = self.records.read().await;
        let matched = filter.apply(records.iter());
        crate::record::summarize(&matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use conductor_protocol::{CallerType, DurationMs};

    fn rec(tool: &str, ms: u64) -> ToolCallRecord {
        ToolCallRecord::success(
            tool,
            CallerType::WorkflowNode,
            "node-1",
            serde_json::json!({}),
            serde_json::json!({"ok": true}),
            DurationMs::from_millis(ms),
            "trace-1",
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn record_and_query_roundtrip() {
        let store = InMemoryAuditStore::default();
        store.record(rec("search", 10)).await;
        store.record(rec("search", 20)).await;
        store.record(rec("fetch", 30)).await;

        let filter = CallFilter { tool_name: Some("search".into()), ..Default::default() };
        let calls = store.get_calls(&filter).await;
        assert_eq!(calls.len(), 2);

        let summary = store.summarize(&filter).await;
        assert_eq!(summary.total_calls, 2);
        assert_eq!(summary.success_count, 2);
    }

    #[tokio::test]
    async fn overflow_drops_oldest_tenth() {
        let store = InMemoryAuditStore::new(10);
        for i in 0..10 {
            store.record(rec("t", i)).await;
        }
        store.record(rec("t", 99)).await;

        let all = store.get_calls(&CallFilter::default()).await;
        assert_eq!(all.len(), 10);
        assert!(all.iter().any(|r| r.duration.as_millis() == 99));
        assert!(!all.iter().any(|r| r.duration.as_millis() == 0));
    }

    #[tokio::test]
    async fn summarize_empty_is_zeroed() {
        let store = InMemoryAuditStore::default();
        let summary = store.summarize(&CallFilter::default()).await;
        assert_eq!(summary.total_calls, 0);
        assert_eq!(summary.p99_ms, 0);
    }
}
