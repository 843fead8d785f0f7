//! Per-running-instance runtime context (§4.9 "Runtime context").

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// Resource amounts reserved for one agent instance.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct ResourceAllocation {
    /// Reserved CPU, in millicores.
    pub cpu_millis: u64,
    /// Reserved memory, in megabytes.
    pub memory_mb: u64,
    /// Reserved GPU slots.
    pub gpu_slots: u32,
}

/// Point-in-time metrics an instance reports about itself.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct InstanceMetrics {
    /// Tool/node operations completed so far.
    pub operations_completed: u64,
    /// Operations that failed.
    pub operations_failed: u64,
    /// Most recently observed memory usage, in megabytes.
    pub memory_mb: u64,
}

/// Per-running-instance state, torn down on [`RuntimeContext::complete`].
pub struct RuntimeContext {
    /// Resources reserved for this instance at admission time.
    pub resources: ResourceAllocation,
    /// Self-reported metrics, updated in place by the instance.
    pub metrics: InstanceMetrics,
    /// Bounded activity log; oldest entries drop on overflow.
    activity: VecDeque<String>,
    activity_capacity: usize,
    /// Unix millis when this context was created.
    pub created_at_ms: u64,
}

impl RuntimeContext {
    /// Build a runtime context for a freshly admitted instance.
    pub fn new(resources: ResourceAllocation, activity_capacity: usize) -> Self {
        Self {
            resources,
            metrics: InstanceMetrics::default(),
            activity: VecDeque::new(),
            activity_capacity,
            created_at_ms: now_ms(),
        }
    }

    /// Append an activity entry, dropping the oldest if at capacity.
    pub fn log_activity(&mut self, entry: impl Into<String>) {
        if self.activity.len() >= self.activity_capacity {
            self.activity.pop_front();
        }
        self.activity.push_back(entry.into());
    }

    /// The current activity log, oldest first.
    pub fn activity(&self) -> impl Iterator<Item = &String> {
        self.activity.iter()
    }

    /// Tear down this context; called once the instance transitions out of
    /// `running`/`paused` for the last time.
    pub fn complete(self) -> InstanceMetrics {
        self.metrics
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}
