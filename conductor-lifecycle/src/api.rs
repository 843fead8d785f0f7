//! The lifecycle API: spawn, terminate, restart (§4.9).

use crate::logger::{EntryKind, ExecutionLogger};
use crate::runtime::{ResourceAllocation, RuntimeContext};
use crate::scheduler::{self, CurrentLoad, Quotas, SchedulingDecision, SchedulingPolicy};
use crate::state::AgentState;
use conductor_protocol::{AgentId, LifecycleError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc::UnboundedSender, RwLock};
use tracing::info;

/// One running (or not-yet-running) agent instance.
pub struct AgentInstance {
    /// The instance's identifier.
    pub id: AgentId,
    /// Caller-supplied agent type tag, opaque to this crate.
    pub agent_type: String,
    /// Current lifecycle state.
    pub state: AgentState,
    /// Present while `state` is `running` or `paused`.
    pub runtime: Option<RuntimeContext>,
    /// Number of times this instance has gone through `restarting`.
    pub restart_count: u32,
}

/// A lifecycle state transition, emitted on every successful change (§4.9
/// "Every transition emits a lifecycle event").
#[derive(Debug, Clone, serde::Serialize)]
pub struct LifecycleEvent {
    /// The instance that transitioned.
    pub agent_id: AgentId,
    /// The state before the transition.
    pub previous_state: AgentState,
    /// The state after the transition.
    pub new_state: AgentState,
    /// Why the transition happened, if the caller supplied one.
    pub reason: Option<String>,
}

/// Spawn/terminate/restart over a set of agent instances, backed by the
/// admission scheduler and the execution logger.
pub struct LifecycleApi {
    instances: RwLock<HashMap<AgentId, AgentInstance>>,
    policy: SchedulingPolicy,
    quotas: Quotas,
    logger: Arc<ExecutionLogger>,
    events: UnboundedSender<LifecycleEvent>,
}

impl LifecycleApi {
    /// Build a lifecycle API under the given policy and quotas.
    pub fn new(
        policy: SchedulingPolicy,
        quotas: Quotas,
        logger: Arc<ExecutionLogger>,
        events: UnboundedSender<LifecycleEvent>,
    ) -> Self {
        Self { instances: RwLock::new(HashMap::new()), policy, quotas, logger, events }
    }

    async fn current_load(&self) -> CurrentLoad {
        let instances = self.instances.read().await;
        let mut load = CurrentLoad::default();
        for instance in instances.values() {
            if instance.state == AgentState::Running {
                load.running_agents += 1;
                if let Some(ctx) = &instance.runtime {
                    load.committed_cpu_millis += ctx.resources.cpu_millis;
                    load.committed_memory_mb += ctx.resources.memory_mb;
                    load.committed_gpu_slots += ctx.resources.gpu_slots;
                }
            }
        }
        load
    }

    fn transition(
        &self,
        instance: &mut AgentInstance,
        next: AgentState,
        reason: Option<String>,
    ) -> Result<(), LifecycleError> {
        if !instance.state.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                from: format!("{:?}", instance.state),
                to: format!("{next:?}"),
            });
        }
        let previous = instance.state;
        instance.state = next;
        let _ = self.events.send(LifecycleEvent {
            agent_id: instance.id.clone(),
            previous_state: previous,
            new_state: next,
            reason,
        });
        Ok(())
    }

    /// Admission-control then transition to `running` (via `initializing`,
    /// `ready`). Returns the admission decision either way so a caller can
    /// surface a rejection reason.
    pub async fn spawn(
        &self,
        id: AgentId,
        agent_type: String,
        resources: ResourceAllocation,
        activity_capacity: usize,
    ) -> Result<SchedulingDecision, LifecycleError> {
        let load = self.current_load().await;
        let decision = scheduler::admit(self.policy, resources, self.quotas, load);
        if !decision.admitted {
            return Ok(decision);
        }

        let mut instances = self.instances.write().await;
        let mut instance =
            AgentInstance { id: id.clone(), agent_type, state: AgentState::Created, runtime: None, restart_count: 0 };

        self.transition(&mut instance, AgentState::Initializing, None)?;
        self.transition(&mut instance, AgentState::Ready, None)?;
        instance.runtime = Some(RuntimeContext::new(resources, activity_capacity));
        self.transition(&mut instance, AgentState::Running, None)?;

        self.logger
            .record(id.clone(), EntryKind::LifecycleOperation, serde_json::json!({"op": "spawn"}))
            .await;
        info!(%id, "agent instance spawned");
        instances.insert(id, instance);
        Ok(decision)
    }

    /// Transition an instance toward `stopped`, releasing its runtime slot.
    pub async fn terminate(&self, id: &AgentId, reason: Option<String>) -> Result<(), LifecycleError> {
        let mut instances = self.instances.write().await;
        let instance = instances.get_mut(id).ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;

        self.transition(instance, AgentState::Stopping, reason.clone())?;
        self.transition(instance, AgentState::Stopped, reason)?;
        if let Some(runtime) = instance.runtime.take() {
            runtime.complete();
        }

        self.logger
            .record(id.clone(), EntryKind::LifecycleOperation, serde_json::json!({"op": "terminate"}))
            .await;
        info!(%id, "agent instance terminated");
        Ok(())
    }

    /// Transition through `restarting -> initializing -> ready -> running`,
    /// bumping the restart counter.
    pub async fn restart(
        &self,
        id: &AgentId,
        reason: Option<String>,
        activity_capacity: usize,
    ) -> Result<(), LifecycleError> {
        let mut instances = self.instances.write().await;
        let instance = instances.get_mut(id).ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;

        if instance.state != AgentState::Failed {
            self.transition(instance, AgentState::Failed, Some("restart requested".into()))?;
        }
        self.transition(instance, AgentState::Restarting, reason.clone())?;
        instance.restart_count += 1;
        self.transition(instance, AgentState::Initializing, reason.clone())?;
        self.transition(instance, AgentState::Ready, reason.clone())?;
        let resources = instance.runtime.as_ref().map(|r| r.resources).unwrap_or_default();
        instance.runtime = Some(RuntimeContext::new(resources, activity_capacity));
        self.transition(instance, AgentState::Running, reason)?;

        self.logger
            .record(id.clone(), EntryKind::LifecycleOperation, serde_json::json!({"op": "restart"}))
            .await;
        info!(%id, restart_count = instance.restart_count, "agent instance restarted");
        Ok(())
    }

    /// The current state of an instance, if it exists.
    pub async fn state_of(&self, id: &AgentId) -> Option<AgentState> {
        self.instances.read().await.get(id).map(|i| i.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quotas() -> Quotas {
        Quotas { max_concurrent_agents: 2, max_cpu_millis: 10_000, max_memory_mb: 10_000, max_gpu_slots: 4 }
    }

    fn api() -> LifecycleApi {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        LifecycleApi::new(SchedulingPolicy::Fifo, quotas(), Arc::new(ExecutionLogger::new(100)), tx)
    }

    #[tokio::test]
    async fn spawn_admits_and_reaches_running() {
        let api = api();
        let decision = api
            .spawn(AgentId::from("a1"), "worker".into(), ResourceAllocation::default(), 10)
            .await
            .unwrap();
        assert!(decision.admitted);
        assert_eq!(api.state_of(&AgentId::from("a1")).await, Some(AgentState::Running));
    }

    #[tokio::test]
    async fn spawn_rejects_past_the_concurrency_ceiling() {
        let api = api();
        for i in 0..2 {
            api.spawn(AgentId::from(format!("a{i}")), "w".into(), ResourceAllocation::default(), 10)
                .await
                .unwrap();
        }
        let decision = api
            .spawn(AgentId::from("a3"), "w".into(), ResourceAllocation::default(), 10)
            .await
            .unwrap();
        assert!(!decision.admitted);
    }

    #[tokio::test]
    async fn terminate_reaches_stopped_and_releases_runtime() {
        let api = api();
        let id = AgentId::from("a1");
        api.spawn(id.clone(), "w".into(), ResourceAllocation::default(), 10).await.unwrap();
        api.terminate(&id, Some("done".into())).await.unwrap();
        assert_eq!(api.state_of(&id).await, Some(AgentState::Stopped));
    }

    #[tokio::test]
    async fn terminate_on_unknown_agent_is_not_found() {
        let api = api();
        let err = api.terminate(&AgentId::from("ghost"), None).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));
    }

    #[tokio::test]
    async fn restart_bumps_the_counter_and_returns_to_running() {
        let api = api();
        let id = AgentId::from("a1");
        api.spawn(id.clone(), "w".into(), ResourceAllocation::default(), 10).await.unwrap();
        api.restart(&id, Some("crashed".into()), 10).await.unwrap();
        assert_eq!(api.state_of(&id).await, Some(AgentState::Running));
    }
}
