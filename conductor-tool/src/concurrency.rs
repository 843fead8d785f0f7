//! Per-tool-name concurrency controller (§4.7).

use conductor_protocol::ToolError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};

struct ToolSlot {
    semaphore: Arc<Semaphore>,
    limit: usize,
    max_queue_length: Option<usize>,
    in_flight: AtomicU64,
    queue_length: AtomicU64,
    total_admitted: AtomicU64,
    total_rejected: AtomicU64,
}

impl ToolSlot {
    fn new(limit: usize, max_queue_length: Option<usize>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            max_queue_length,
            in_flight: AtomicU64::new(0),
            queue_length: AtomicU64::new(0),
            total_admitted: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
        }
    }
}

/// A snapshot of one tool's concurrency metrics (§4.7).
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolConcurrencyMetrics {
    /// Calls currently holding a slot.
    pub in_flight: u64,
    /// Calls currently FIFO-queued awaiting a slot.
    pub queue_length: u64,
    /// Calls admitted over the controller's lifetime.
    pub total_admitted: u64,
    /// Calls rejected outright (queue-length ceiling hit) over the controller's lifetime.
    pub total_rejected: u64,
    /// The concurrency ceiling in effect for this tool.
    pub limit: usize,
}

/// Holds an admitted call's slot; releases it (and decrements `in_flight`)
/// when dropped.
pub struct ConcurrencySlot {
    _tool_permit: OwnedSemaphorePermit,
    _overall_permit: OwnedSemaphorePermit,
    slot: Arc<ToolSlot>,
}

impl Drop for ConcurrencySlot {
    fn drop(&mut self) {
        self.slot.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// FIFO-queuing concurrency controller with a per-tool ceiling and an
/// overall process-wide ceiling (§4.7).
pub struct ConcurrencyController {
    overall: Arc<Semaphore>,
    default_limit: usize,
    tools: RwLock<HashMap<String, Arc<ToolSlot>>>,
}

impl ConcurrencyController {
    /// Build a controller with the given process-wide ceiling and the
    /// default per-tool ceiling applied to tools with no explicit limit.
    pub fn new(overall_limit: usize, default_tool_limit: usize) -> Self {
        Self {
            overall: Arc::new(Semaphore::new(overall_limit)),
            default_limit: default_tool_limit,
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register or update a tool's concurrency ceiling and optional
    /// queue-length cap. Existing in-flight calls are unaffected.
    pub async fn configure_tool(&self, name: &str, limit: Option<usize>, max_queue_length: Option<usize>) {
        let limit = limit.unwrap_or(self.default_limit);
        self.tools.write().await.insert(name.to_string(), Arc::new(ToolSlot::new(limit, max_queue_length)));
    }

    async fn slot_for(&self, name: &str) -> Arc<ToolSlot> {
        if let Some(slot) = self.tools.read().await.get(name) {
            return slot.clone();
        }
        let mut tools = self.tools.write().await;
        tools.entry(name.to_string()).or_insert_with(|| Arc::new(ToolSlot::new(self.default_limit, None))).clone()
    }

    /// Admit a call for `name`, queuing FIFO if no slot is immediately
    /// available. Rejects immediately if the tool's queue-length ceiling
    /// is configured and already reached.
    pub async fn acquire(&self, name: &str) -> Result<ConcurrencySlot, ToolError> {
        let slot = self.slot_for(name).await;

        if let Some(max_queue) = slot.max_queue_length {
            if slot.queue_length.load(Ordering::SeqCst) as usize >= max_queue {
                slot.total_rejected.fetch_add(1, Ordering::SeqCst);
                return Err(ToolError::QuotaExceeded(name.to_string()));
            }
        }

        slot.queue_length.fetch_add(1, Ordering::SeqCst);
        let tool_permit = slot.semaphore.clone().acquire_owned().await.expect("semaphore never closed");
        let overall_permit = self.overall.clone().acquire_owned().await.expect("semaphore never closed");
        slot.queue_length.fetch_sub(1, Ordering::SeqCst);
        slot.in_flight.fetch_add(1, Ordering::SeqCst);
        slot.total_admitted.fetch_add(1, Ordering::SeqCst);

        Ok(ConcurrencySlot { _tool_permit: tool_permit, _overall_permit: overall_permit, slot })
    }

    /// A snapshot of one tool's metrics, or `None` if never configured/called.
    pub async fn metrics(&self, name: &str) -> Option<ToolConcurrencyMetrics> {
        let tools = self.tools.read().await;
        tools.get(name).map(|slot| ToolConcurrencyMetrics {
            in_flight: slot.in_flight.load(Ordering::SeqCst),
            queue_length: slot.queue_length.load(Ordering::SeqCst),
            total_admitted: slot.total_admitted.load(Ordering::SeqCst),
            total_rejected: slot.total_rejected.load(Ordering::SeqCst),
            limit: slot.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_within_limit_and_releases_on_drop() {
        let controller = ConcurrencyController::new(10, 2);
        controller.configure_tool("search", Some(1), None).await;

        let slot1 = controller.acquire("search").await.unwrap();
        let metrics = controller.metrics("search").await.unwrap();
        assert_eq!(metrics.in_flight, 1);
        drop(slot1);

        let _slot2 = controller.acquire("search").await.unwrap();
        let metrics = controller.metrics("search").await.unwrap();
        assert_eq!(metrics.total_admitted, 2);
    }

    #[tokio::test]
    async fn rejects_when_queue_length_ceiling_hit() {
        let controller = ConcurrencyController::new(10, 1);
        controller.configure_tool("search", Some(1), Some(0)).await;

        let _slot = controller.acquire("search").await.unwrap();
        let err = controller.acquire("search").await;
        assert!(err.is_err());
    }
}
