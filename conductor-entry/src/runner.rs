//! The self-repair attempt loop (§4.4).

use crate::event::{RepairEvent, StopReason};
use crate::repair;
use conductor_protocol::{NodeId, RunContext, ToolRepository, WorkflowRepository};
use conductor_workflow::{validate, DagExecutor, Workflow, WorkflowEvent};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

/// Maximum number of C5 execution attempts per run (§4.4 "Total attempts ≤ 3").
const MAX_ATTEMPTS: u32 = 3;

/// Mediates between persistence and execution: runs a validated workflow
/// through C5, and on certain recoverable failures patches, re-validates,
/// persists, and retries — up to [`MAX_ATTEMPTS`] attempts total.
pub struct SelfRepairRunner {
    workflow_repo: Arc<dyn WorkflowRepository>,
    tool_repo: Arc<dyn ToolRepository>,
    executor: Arc<DagExecutor>,
}

impl SelfRepairRunner {
    /// Build a runner over the repositories and executor it mediates between.
    pub fn new(
        workflow_repo: Arc<dyn WorkflowRepository>,
        tool_repo: Arc<dyn ToolRepository>,
        executor: Arc<DagExecutor>,
    ) -> Self {
        Self { workflow_repo, tool_repo, executor }
    }

    /// Drive `workflow` to completion, patching and retrying on recoverable
    /// failures. Returns the final output on success, or the reason the
    /// loop gave up.
    pub async fn run(
        &self,
        workflow: Workflow,
        ctx: RunContext,
        events: &UnboundedSender<RepairEvent>,
    ) -> Result<serde_json::Value, StopReason> {
        let mut workflow = workflow;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let _ = events.send(RepairEvent::WorkflowReactLoopStarted { attempt });

            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let result = self.executor.execute(&workflow, ctx.clone(), &tx).await;
            drop(tx);

            let node_err = match result {
                Ok(output) => {
                    let _ = events.send(RepairEvent::WorkflowComplete { output: output.clone() });
                    return Ok(output);
                }
                Err(e) => e,
            };

            let mut last_node_error: Option<(NodeId, conductor_protocol::ErrorKind, bool)> = None;
            while let Ok(event) = rx.try_recv() {
                if let WorkflowEvent::NodeError { node_id, error_type, retryable, .. } = event {
                    last_node_error = Some((node_id, error_type, retryable));
                }
            }

            let error_type = node_err.kind();
            let error_msg = node_err.to_string();
            let _ = events.send(RepairEvent::WorkflowAttemptFailed {
                attempt,
                error_type,
                error: error_msg.clone(),
            });
            warn!(attempt, %error_msg, "workflow attempt failed");

            if attempt >= MAX_ATTEMPTS {
                return self.terminate(attempt, error_type, error_msg, StopReason::ConsecutiveFailures, events);
            }

            let Some((node_id, node_error_type, retryable)) = last_node_error else {
                return self.terminate(attempt, error_type, error_msg, StopReason::NoPatchAvailable, events);
            };

            let Some(failing_node) = workflow.nodes.iter().find(|n| n.id == node_id).cloned() else {
                return self.terminate(attempt, error_type, error_msg, StopReason::NoPatchAvailable, events);
            };

            let Some(patch) =
                repair::propose(&failing_node, node_error_type, retryable, self.tool_repo.as_ref()).await
            else {
                return self.terminate(attempt, error_type, error_msg, StopReason::NoPatchAvailable, events);
            };

            let mut candidate = workflow.clone();
            if let Some(node) = candidate.nodes.iter_mut().find(|n| &n.id == patch.node_id()) {
                patch.apply(node);
            }

            let validated = match validate(&candidate, self.tool_repo.as_ref(), self.executor.registry()).await {
                Ok(w) => w,
                Err(_) => {
                    return self.terminate(attempt, error_type, error_msg, StopReason::ValidationFailed, events);
                }
            };

            let serialized = match serde_json::to_value(&validated) {
                Ok(v) => v,
                Err(_) => {
                    return self.terminate(attempt, error_type, error_msg, StopReason::ValidationFailed, events);
                }
            };
            if self.workflow_repo.save(serialized).await.is_err() {
                return self.terminate(attempt, error_type, error_msg, StopReason::ValidationFailed, events);
            }

            info!(attempt, node_id = %patch.node_id(), "self-repair patch applied");
            let _ = events.send(RepairEvent::WorkflowReactPatchApplied {
                attempt,
                patch: describe(&patch),
            });
            workflow = validated;
        }
    }

    fn terminate(
        &self,
        attempt: u32,
        error_type: conductor_protocol::ErrorKind,
        error: String,
        stop_reason: StopReason,
        events: &UnboundedSender<RepairEvent>,
    ) -> Result<serde_json::Value, StopReason> {
        let _ = events.send(RepairEvent::WorkflowTerminationReport { stop_reason, attempts: attempt });
        let _ = events.send(RepairEvent::WorkflowError { attempt, error_type, error });
        Err(stop_reason)
    }
}

fn describe(patch: &repair::Patch) -> String {
    match patch {
        repair::Patch::IncreaseTimeout { node_id, new_timeout_ms } => {
            format!("increased timeout on {node_id} to {new_timeout_ms}ms")
        }
        repair::Patch::SwapTool { node_id, new_tool_id } => {
            format!("swapped tool_id on {node_id} to {new_tool_id}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_protocol::test_utils::{EchoNodeExecutor, FailingNodeExecutor, InMemoryToolRepository};
    use conductor_protocol::{NodeKind, RunId, WorkflowId};
    use conductor_state_memory_stub::MemoryWorkflowStore;
    use conductor_workflow::{Node, NodeExecutorRegistry, Position};

    // A minimal in-test WorkflowRepository so this crate's tests don't need
    // to depend on conductor-state-memory.
    mod conductor_state_memory_stub {
        use async_trait::async_trait;
        use conductor_protocol::{RepositoryError, WorkflowId, WorkflowRepository};
        use std::sync::Mutex;

        #[derive(Default)]
        pub struct MemoryWorkflowStore {
            saved: Mutex<Vec<serde_json::Value>>,
        }

        impl MemoryWorkflowStore {
            pub fn new() -> Self {
                Self::default()
            }
        }

        #[async_trait]
        impl WorkflowRepository for MemoryWorkflowStore {
            async fn save(&self, workflow: serde_json::Value) -> Result<(), RepositoryError> {
                self.saved.lock().unwrap().push(workflow);
                Ok(())
            }

            async fn load(&self, id: &WorkflowId) -> Result<serde_json::Value, RepositoryError> {
                Err(RepositoryError::NotFound(id.to_string()))
            }
        }
    }

    fn ctx() -> RunContext {
        RunContext {
            workflow_id: WorkflowId::from("wf1"),
            run_id: RunId::from("run1"),
            initial_input: serde_json::json!({}),
            cancellation: tokio_util::sync::CancellationToken::new(),
        }
    }

    fn workflow_with(kind: NodeKind, config: serde_json::Value) -> Workflow {
        Workflow {
            id: WorkflowId::from("wf1"),
            name: "w".into(),
            nodes: vec![Node { id: NodeId::from("n1"), kind, config, position: Position::default(), retry_count: 0 }],
            edges: vec![],
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let mut registry = NodeExecutorRegistry::new();
        registry.register(&NodeKind::Custom("ok".into()), Arc::new(EchoNodeExecutor));
        let executor = Arc::new(DagExecutor::new(registry));
        let tool_repo = Arc::new(InMemoryToolRepository::new(vec![]));
        let workflow_repo = Arc::new(conductor_state_memory_stub::MemoryWorkflowStore::new());
        let runner = SelfRepairRunner::new(workflow_repo, tool_repo, executor);

        let workflow = workflow_with(NodeKind::Custom("ok".into()), serde_json::json!({}));
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let result = runner.run(workflow, ctx(), &tx).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn gives_up_with_no_patch_available_for_a_non_recoverable_error() {
        let mut registry = NodeExecutorRegistry::new();
        registry.register(
            &NodeKind::Custom("bad".into()),
            Arc::new(FailingNodeExecutor { message: "boom".into(), retryable: false }),
        );
        let executor = Arc::new(DagExecutor::new(registry));
        let tool_repo = Arc::new(InMemoryToolRepository::new(vec![]));
        let workflow_repo = Arc::new(conductor_state_memory_stub::MemoryWorkflowStore::new());
        let runner = SelfRepairRunner::new(workflow_repo, tool_repo, executor);

        let workflow = workflow_with(NodeKind::Custom("bad".into()), serde_json::json!({}));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let result = runner.run(workflow, ctx(), &tx).await;
        assert_eq!(result.unwrap_err(), StopReason::NoPatchAvailable);

        drop(tx);
        let mut saw_termination_report = false;
        let mut saw_terminal_error = false;
        while let Some(event) = rx.recv().await {
            match event {
                RepairEvent::WorkflowTerminationReport { .. } => saw_termination_report = true,
                RepairEvent::WorkflowError { .. } => saw_terminal_error = true,
                _ => {}
            }
        }
        assert!(saw_termination_report);
        assert!(saw_terminal_error);
    }
}
