//! Pluggable admission scheduling (§4.9 "Scheduler").

use crate::runtime::ResourceAllocation;
use serde::{Deserialize, Serialize};

/// The closed set of admission policies.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicy {
    /// Highest declared priority admitted first.
    Priority,
    /// First requested, first admitted.
    Fifo,
    /// Admission weighted by current per-host load.
    ResourceAware,
    /// Admission proportioned across callers by weight.
    WeightedFair,
    /// Admits onto whichever host currently reports the lowest load.
    LeastLoaded,
    /// Cycles admission across hosts in turn.
    RoundRobin,
}

/// Global and per-resource ceilings the scheduler admits against.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Quotas {
    /// Maximum agent instances running concurrently, process-wide.
    pub max_concurrent_agents: usize,
    /// Maximum CPU millicores committed at once.
    pub max_cpu_millis: u64,
    /// Maximum memory committed at once, in megabytes.
    pub max_memory_mb: u64,
    /// Maximum GPU slots committed at once.
    pub max_gpu_slots: u32,
}

/// Current demand against [`Quotas`], tracked by the caller (typically
/// [`crate::api::LifecycleApi`]) and passed in on every admission check.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentLoad {
    /// Agents currently running.
    pub running_agents: usize,
    /// CPU millicores currently committed.
    pub committed_cpu_millis: u64,
    /// Memory currently committed, in megabytes.
    pub committed_memory_mb: u64,
    /// GPU slots currently committed.
    pub committed_gpu_slots: u32,
    /// A host load figure in `[0.0, 1.0]`, used by resource-aware/least-loaded policies.
    pub host_load: f64,
}

/// A structured record of why an admission check landed where it did
/// (Supplemented feature: scheduling transparency for operators/UIs).
#[derive(Debug, Clone, Serialize)]
pub struct SchedulingDecision {
    /// Whether the request was admitted.
    pub admitted: bool,
    /// The policy in effect when this decision was made.
    pub policy: SchedulingPolicy,
    /// Developer-readable reason, set when `admitted` is `false`.
    pub reason: Option<String>,
    /// Host load observed at decision time.
    pub host_load: f64,
    /// Requested resources.
    pub requested: ResourceAllocation,
    /// Quotas in effect at decision time.
    pub quotas: Quotas,
}

/// Run an admission check. Never blocks (§5 "Scheduler admission never
/// blocks indefinitely").
pub fn admit(
    policy: SchedulingPolicy,
    requested: ResourceAllocation,
    quotas: Quotas,
    load: CurrentLoad,
) -> SchedulingDecision {
    let mut reason = None;

    if load.running_agents >= quotas.max_concurrent_agents {
        reason = Some("max_concurrent_agents reached".to_string());
    } else if load.committed_cpu_millis + requested.cpu_millis > quotas.max_cpu_millis {
        reason = Some("cpu quota exceeded".to_string());
    } else if load.committed_memory_mb + requested.memory_mb > quotas.max_memory_mb {
        reason = Some("memory quota exceeded".to_string());
    } else if load.committed_gpu_slots + requested.gpu_slots > quotas.max_gpu_slots {
        reason = Some("gpu quota exceeded".to_string());
    } else if matches!(policy, SchedulingPolicy::ResourceAware | SchedulingPolicy::LeastLoaded)
        && load.host_load >= 1.0
    {
        reason = Some("host load saturated".to_string());
    }

    SchedulingDecision {
        admitted: reason.is_none(),
        policy,
        reason,
        host_load: load.host_load,
        requested,
        quotas,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quotas() -> Quotas {
        Quotas { max_concurrent_agents: 2, max_cpu_millis: 1000, max_memory_mb: 1024, max_gpu_slots: 1 }
    }

    #[test]
    fn admits_within_quota() {
        let decision = admit(
            SchedulingPolicy::Fifo,
            ResourceAllocation { cpu_millis: 100, memory_mb: 128, gpu_slots: 0 },
            quotas(),
            CurrentLoad::default(),
        );
        assert!(decision.admitted);
    }

    #[test]
    fn rejects_over_concurrent_agent_ceiling() {
        let load = CurrentLoad { running_agents: 2, ..Default::default() };
        let decision = admit(
            SchedulingPolicy::Priority,
            ResourceAllocation::default(),
            quotas(),
            load,
        );
        assert!(!decision.admitted);
        assert_eq!(decision.reason.as_deref(), Some("max_concurrent_agents reached"));
    }

    #[test]
    fn resource_aware_rejects_a_saturated_host() {
        let load = CurrentLoad { host_load: 1.0, ..Default::default() };
        let decision = admit(
            SchedulingPolicy::ResourceAware,
            ResourceAllocation::default(),
            quotas(),
            load,
        );
        assert!(!decision.admitted);
    }
}
