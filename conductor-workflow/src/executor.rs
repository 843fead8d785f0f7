//! The workflow DAG executor (§4.2, C5).

use crate::model::Workflow;
use crate::registry::NodeExecutorRegistry;
use crate::toposort::topological_order;
use conductor_protocol::{NodeExecError, NodeId, NodeInputs, NodeKind, RunContext};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use serde::Serialize;
use tracing::{info_span, Instrument};

/// One event in a run's execution stream (§4.2 contract, §6 "Run event stream").
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// The run began.
    WorkflowStart,
    /// A node's execution began.
    NodeStart {
        /// The node's id.
        node_id: NodeId,
    },
    /// A node completed successfully.
    NodeComplete {
        /// The node's id.
        node_id: NodeId,
        /// The node's output.
        output: serde_json::Value,
    },
    /// A node failed; carries the classification needed to decide on a retry.
    NodeError {
        /// The node's id.
        node_id: NodeId,
        /// The node's kind tag.
        node_type: String,
        /// The error's stable kind tag.
        error_type: conductor_protocol::ErrorKind,
        /// Whether the error is retryable.
        retryable: bool,
        /// Free-text detail.
        error: String,
    },
    /// The run finished successfully.
    WorkflowComplete {
        /// The final value (the end node's output).
        output: serde_json::Value,
    },
    /// The run terminated with an unrecoverable failure.
    WorkflowError {
        /// The offending node's id.
        node_id: NodeId,
        /// The offending node's kind tag.
        node_type: String,
        /// The error's stable kind tag.
        error_type: conductor_protocol::ErrorKind,
        /// Whether the failing executor marked this retryable (exhausted anyway).
        retryable: bool,
        /// Free-text detail.
        error: String,
    },
}

/// Per-node retry policy: up to `node.retry_count` attempts, exponential
/// backoff starting at `base_delay` and doubling each attempt.
const BASE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Computes a topological order once, then runs each node in order,
/// gathering inputs from predecessors (§4.2 "Algorithm").
pub struct DagExecutor {
    registry: NodeExecutorRegistry,
}

impl DagExecutor {
    /// Build an executor over a node-kind dispatch registry.
    pub fn new(registry: NodeExecutorRegistry) -> Self {
        Self { registry }
    }

    /// The dispatch registry this executor runs over. C7 re-validates a
    /// patched workflow against the same registry before re-running it,
    /// so it needs a way back to it.
    pub fn registry(&self) -> &NodeExecutorRegistry {
        &self.registry
    }

    /// Execute `workflow` to completion, streaming events to `events`.
    /// Returns the end node's output (or, with multiple end nodes, a
    /// JSON object keyed by node id).
    pub async fn execute(
        &self,
        workflow: &Workflow,
        ctx: RunContext,
        events: &UnboundedSender<WorkflowEvent>,
    ) -> Result<serde_json::Value, NodeExecError> {
        let _ = events.send(WorkflowEvent::WorkflowStart);

        let node_ids: Vec<NodeId> = workflow.nodes.iter().map(|n| n.id.clone()).collect();
        let edge_pairs: Vec<(NodeId, NodeId)> =
            workflow.edges.iter().map(|e| (e.source.clone(), e.target.clone())).collect();
        let order = topological_order(&node_ids, &edge_pairs)
            .map_err(|_| NodeExecError::Failed { message: "cycle detected at execution time".into(), retryable: false })?;

        let nodes_by_id: HashMap<&NodeId, &crate::model::Node> = workflow.nodes.iter().map(|n| (&n.id, n)).collect();
        let mut outputs: HashMap<NodeId, serde_json::Value> = HashMap::new();

        for node_id in &order {
            let node = nodes_by_id[node_id];
            let inputs = self.gather_inputs(workflow, node_id, &outputs, &ctx);

            let _ = events.send(WorkflowEvent::NodeStart { node_id: node_id.clone() });

            match self.run_node(node, &inputs, &ctx).await {
                Ok(output) => {
                    let _ = events.send(WorkflowEvent::NodeComplete { node_id: node_id.clone(), output: output.clone() });
                    outputs.insert(node_id.clone(), output);
                }
                Err(e) => {
                    let retryable = e.retryable();
                    let _ = events.send(WorkflowEvent::NodeError {
                        node_id: node_id.clone(),
                        node_type: node.kind.tag(),
                        error_type: e.kind(),
                        retryable,
                        error: e.to_string(),
                    });
                    let _ = events.send(WorkflowEvent::WorkflowError {
                        node_id: node_id.clone(),
                        node_type: node.kind.tag(),
                        error_type: e.kind(),
                        retryable,
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }

        let end_outputs: Vec<(&NodeId, &serde_json::Value)> = workflow
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::End)
            .filter_map(|n| outputs.get(&n.id).map(|v| (&n.id, v)))
            .collect();

        let final_value = match end_outputs.as_slice() {
            [] => serde_json::Value::Null,
            [(_, only)] => (*only).clone(),
            many => serde_json::Value::Object(many.iter().map(|(id, v)| (id.to_string(), (*v).clone())).collect()),
        };

        let _ = events.send(WorkflowEvent::WorkflowComplete { output: final_value.clone() });
        Ok(final_value)
    }

    fn gather_inputs(
        &self,
        workflow: &Workflow,
        node_id: &NodeId,
        outputs: &HashMap<NodeId, serde_json::Value>,
        ctx: &RunContext,
    ) -> NodeInputs {
        let node = workflow.nodes.iter().find(|n| &n.id == node_id).expect("node in topological order exists");
        if node.kind == NodeKind::Input || node.kind == NodeKind::Start {
            let mut map = NodeInputs::new();
            map.insert(node_id.clone(), ctx.initial_input.clone());
            return map;
        }
        workflow
            .predecessors_of(node_id)
            .filter_map(|pred| outputs.get(pred).map(|v| (pred.clone(), v.clone())))
            .collect()
    }

    /// Run a single node in isolation, applying the same dispatch and
    /// retry policy `execute` uses internally. C6 calls this directly for
    /// its `execute_node`/`error_recovery` actions, which run one node at
    /// a time rather than the whole graph.
    pub async fn execute_node(
        &self,
        node: &crate::model::Node,
        inputs: &NodeInputs,
        ctx: &RunContext,
    ) -> Result<serde_json::Value, NodeExecError> {
        self.run_node(node, inputs, ctx).await
    }

    /// Run one node, applying the §4.2 retry-with-backoff policy for
    /// retryable failures, up to `node.retry_count` attempts.
    async fn run_node(
        &self,
        node: &crate::model::Node,
        inputs: &NodeInputs,
        ctx: &RunContext,
    ) -> Result<serde_json::Value, NodeExecError> {
        let view = node.to_view();
        let span = info_span!("node_execution", node_id = %node.id, node_kind = %node.kind.tag());

        async {
            let mut attempt: u32 = 0;
            loop {
                let outcome = self.dispatch(&view, inputs, ctx).await;
                match outcome {
                    Ok(value) => return Ok(value),
                    Err(e) if e.retryable() && attempt < node.retry_count => {
                        attempt += 1;
                        let delay = BASE_RETRY_DELAY * 2u32.pow(attempt.min(8));
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = ctx.cancellation.cancelled() => return Err(NodeExecError::Cancelled),
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(
        &self,
        view: &conductor_protocol::NodeView,
        inputs: &NodeInputs,
        ctx: &RunContext,
    ) -> Result<serde_json::Value, NodeExecError> {
        if ctx.cancellation.is_cancelled() {
            return Err(NodeExecError::Cancelled);
        }
        if view.kind.is_builtin() {
            return Ok(builtin_dispatch(view, inputs));
        }
        let Some(executor) = self.registry.get(&view.kind) else {
            return Err(NodeExecError::MissingExecutor(view.kind.tag()));
        };
        let timeout = view.timeout.to_std();
        tokio::select! {
            result = executor.execute(view, inputs, ctx) => result,
            _ = tokio::time::sleep(timeout) => Err(NodeExecError::Timeout),
            _ = ctx.cancellation.cancelled() => Err(NodeExecError::Cancelled),
        }
    }
}

/// Execution for the runtime-owned builtin kinds: pass-through of gathered
/// inputs (`input`/`start`/`default`/`end`/`output` all behave the same at
/// the executor level — they differ only in their role in the graph shape).
fn builtin_dispatch(_view: &conductor_protocol::NodeView, inputs: &NodeInputs) -> serde_json::Value {
    if inputs.len() == 1 {
        inputs.values().next().cloned().unwrap_or(serde_json::Value::Null)
    } else {
        serde_json::to_value(inputs).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Node, Position};
    use conductor_protocol::{test_utils::FailingNodeExecutor, EdgeId, RunId, WorkflowId};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn node(id: &str, kind: NodeKind) -> Node {
        Node { id: NodeId::from(id), kind, config: serde_json::json!({}), position: Position::default(), retry_count: 0 }
    }

    fn ctx() -> RunContext {
        RunContext {
            workflow_id: WorkflowId::from("wf"),
            run_id: RunId::from("run-1"),
            initial_input: serde_json::json!({"x": 1}),
            cancellation: CancellationToken::new(),
        }
    }

    fn chain_workflow() -> Workflow {
        Workflow {
            id: WorkflowId::from("wf"),
            name: "chain".into(),
            nodes: vec![node("start", NodeKind::Start), node("mid", NodeKind::Default), node("end", NodeKind::End)],
            edges: vec![
                Edge { id: EdgeId::from("e1"), source: NodeId::from("start"), target: NodeId::from("mid") },
                Edge { id: EdgeId::from("e2"), source: NodeId::from("mid"), target: NodeId::from("end") },
            ],
        }
    }

    #[tokio::test]
    async fn runs_a_simple_chain_to_completion() {
        let executor = DagExecutor::new(NodeExecutorRegistry::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let result = executor.execute(&chain_workflow(), ctx(), &tx).await.unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));

        drop(tx);
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        assert!(matches!(events.first(), Some(WorkflowEvent::WorkflowStart)));
        assert!(matches!(events.last(), Some(WorkflowEvent::WorkflowComplete { .. })));
    }

    #[tokio::test]
    async fn non_retryable_failure_stops_the_run() {
        let mut registry = NodeExecutorRegistry::new();
        registry.register(
            &NodeKind::Transform,
            Arc::new(FailingNodeExecutor { message: "boom".into(), retryable: false }),
        );
        let executor = DagExecutor::new(registry);
        let mut workflow = chain_workflow();
        workflow.nodes[1] = node("mid", NodeKind::Transform);

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let err = executor.execute(&workflow, ctx(), &tx).await.unwrap_err();
        assert!(matches!(err, NodeExecError::Failed { retryable: false, .. }));
    }

    #[tokio::test]
    async fn retryable_failure_is_retried_up_to_retry_count() {
        let mut registry = NodeExecutorRegistry::new();
        registry.register(
            &NodeKind::Transform,
            Arc::new(FailingNodeExecutor { message: "flaky".into(), retryable: true }),
        );
        let executor = DagExecutor::new(registry);
        let mut workflow = chain_workflow();
        let mut failing = node("mid", NodeKind::Transform);
        failing.retry_count = 2;
        workflow.nodes[1] = failing;

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let err = executor.execute(&workflow, ctx(), &tx).await.unwrap_err();
        assert!(matches!(err, NodeExecError::Failed { .. }));
    }

    #[tokio::test]
    async fn cancellation_aborts_node_execution() {
        let mut workflow = chain_workflow();
        workflow.nodes[1] = node("mid", NodeKind::Transform);
        let mut registry = NodeExecutorRegistry::new();
        registry.register(&NodeKind::Transform, Arc::new(conductor_protocol::test_utils::EchoNodeExecutor));
        let executor = DagExecutor::new(registry);

        let run_ctx = ctx();
        run_ctx.cancellation.cancel();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let err = executor.execute(&workflow, run_ctx, &tx).await.unwrap_err();
        assert!(matches!(err, NodeExecError::Cancelled));
    }
}
