//! The reason-act-observe control loop (§4.3).
//!
//! One call to [`ReactOrchestrator::run`] drives a workflow from its
//! initial input to a terminal [`LoopOutcome`], alternating four steps
//! per iteration: reasoning (an LM call), parse-and-validate (§4.3 step
//! 2, capped at three attempts), acting (dispatching the coerced
//! [`Action`] against C5), and observation (folding the result back
//! into the message log). Both suspension points — the LM call and any
//! node dispatch — race the run's [`CancellationToken`] so a cancelled
//! run never blocks past its next yield point.

use crate::action::Action;
use crate::parse::{parse_action, ParseError};
use crate::prompt::{retry_prompt, system_prompt};
use crate::state::{LoopState, LoopStatus};
use conductor_protocol::{LmClient, LmMessage, NodeExecError, ReactError, RunContext};
use conductor_workflow::{DagExecutor, Workflow};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

const MAX_PARSE_ATTEMPTS: u32 = 3;

/// The ordered event stream emitted once per loop iteration (§4.3).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReactEvent {
    /// The loop has begun.
    WorkflowStarted,
    /// A reasoning (LM) call has started.
    ReasoningStarted {
        /// 1-based iteration number.
        iteration: u32,
    },
    /// The reasoning call returned.
    ReasoningCompleted {
        /// 1-based iteration number.
        iteration: u32,
    },
    /// The reasoning call failed outright (not a parse failure).
    ReasoningFailed {
        /// 1-based iteration number.
        iteration: u32,
        /// Failure detail.
        error: String,
    },
    /// Acting on a coerced action has started.
    ActionStarted {
        /// The action's wire tag.
        action: &'static str,
    },
    /// Acting failed (parse exhaustion or node execution error).
    ActionFailed {
        /// The action's wire tag, if one was coerced at all.
        action: Option<&'static str>,
        /// Failure detail.
        error: String,
    },
    /// An observation is being recorded.
    ObservationStarted,
    /// The observation was folded back into the message log.
    ObservationCompleted,
    /// One full reason/act/observe cycle has finished.
    IterationCompleted {
        /// 1-based iteration number.
        iteration: u32,
    },
    /// The loop has reached a terminal state.
    LoopCompleted {
        /// The terminal status reached.
        status: &'static str,
    },
}

/// How a run concluded.
#[derive(Debug, Clone)]
pub enum LoopOutcome {
    /// `finish` was reached; carries the last recorded observation.
    Completed(serde_json::Value),
    /// `wait` was reached; the caller must resume the run externally.
    Suspended,
}

/// Drives one workflow run through the reason-act-observe loop.
pub struct ReactOrchestrator {
    lm: Arc<dyn LmClient>,
    executor: Arc<DagExecutor>,
}

impl ReactOrchestrator {
    /// Build an orchestrator over an LM collaborator and the C5 executor
    /// it dispatches `execute_node`/`error_recovery` actions through.
    pub fn new(lm: Arc<dyn LmClient>, executor: Arc<DagExecutor>) -> Self {
        Self { lm, executor }
    }

    /// Run `workflow` to a terminal outcome.
    pub async fn run(
        &self,
        workflow: &Workflow,
        ctx: RunContext,
        max_iterations: u32,
        max_steps: u32,
        events: &tokio::sync::mpsc::UnboundedSender<ReactEvent>,
    ) -> Result<LoopOutcome, ReactError> {
        let available_nodes = workflow.nodes.iter().map(|n| n.id.clone()).collect();
        let mut state = LoopState::new(available_nodes, max_iterations, max_steps);
        let mut last_observation = serde_json::Value::Null;

        let _ = events.send(ReactEvent::WorkflowStarted);

        while state.can_iterate() {
            state.iteration_count += 1;
            let iteration = state.iteration_count;
            let span = info_span!("react_iteration", %iteration, workflow_id = %workflow.id);

            let outcome = async {
                // 1. Reasoning.
                let _ = events.send(ReactEvent::ReasoningStarted { iteration });
                if state.messages.is_empty() {
                    state.messages.push(LmMessage::system(system_prompt(
                        &workflow.id,
                        &workflow.name,
                        &state,
                    )));
                }
                let raw = self.call_model(&state, &ctx).await.map_err(|e| {
                    let _ = events.send(ReactEvent::ReasoningFailed {
                        iteration,
                        error: e.to_string(),
                    });
                    e
                })?;
                let _ = events.send(ReactEvent::ReasoningCompleted { iteration });
                state.messages.push(LmMessage::assistant(raw.clone()));

                // 2. Parse-and-validate, up to MAX_PARSE_ATTEMPTS attempts.
                let action = self.parse_with_retries(raw, &mut state, &ctx).await.map_err(|e| {
                    let _ = events.send(ReactEvent::ReasoningFailed {
                        iteration,
                        error: e.to_string(),
                    });
                    e
                })?;
                let _ = events.send(ReactEvent::ActionStarted { action: action.tag() });

                // 3. Acting.
                let act_result = self.act(&action, workflow, &mut state, &ctx).await;
                let observation = act_result.map_err(|e| {
                    let _ = events.send(ReactEvent::ActionFailed {
                        action: Some(action.tag()),
                        error: e.to_string(),
                    });
                    e
                })?;

                // 4. Observation.
                let _ = events.send(ReactEvent::ObservationStarted);
                if let Some(value) = observation.clone() {
                    last_observation = value.clone();
                    state.messages.push(LmMessage::user(
                        serde_json::json!({ "observation": value }).to_string(),
                    ));
                }
                let _ = events.send(ReactEvent::ObservationCompleted);

                match &action {
                    Action::Finish => {
                        state.status = LoopStatus::Completed;
                    }
                    Action::Wait => {
                        state.status = LoopStatus::Suspended;
                    }
                    _ => {}
                }

                Ok::<(), ReactError>(())
            }
            .instrument(span)
            .await;

            if let Err(e) = outcome {
                state.status = LoopStatus::Failed;
                let _ = events.send(ReactEvent::LoopCompleted { status: "failed" });
                return Err(e);
            }
            state.current_step += 1;
            let _ = events.send(ReactEvent::IterationCompleted { iteration });

            if state.status != LoopStatus::Running {
                break;
            }
        }

        if state.status == LoopStatus::Running {
            state.status = LoopStatus::Failed;
        }

        let status_tag = match state.status {
            LoopStatus::Completed => "completed",
            LoopStatus::Suspended => "suspended",
            LoopStatus::Failed => "failed",
            LoopStatus::Running => unreachable!("loop exited while still running"),
        };
        let _ = events.send(ReactEvent::LoopCompleted { status: status_tag });

        match state.status {
            LoopStatus::Completed => Ok(LoopOutcome::Completed(last_observation)),
            LoopStatus::Suspended => Ok(LoopOutcome::Suspended),
            LoopStatus::Failed => Err(ReactError::ParseExhausted {
                attempts: MAX_PARSE_ATTEMPTS,
                message: "iteration or step budget exhausted".to_owned(),
            }),
            LoopStatus::Running => unreachable!(),
        }
    }

    /// Invoke the LM collaborator, racing run cancellation (§4.3 "Cancellation").
    async fn call_model(&self, state: &LoopState, ctx: &RunContext) -> Result<String, ReactError> {
        tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => Err(ReactError::Cancelled),
            result = self.lm.invoke(&state.messages) => {
                result.map_err(|e| ReactError::Model(e.to_string()))
            }
        }
    }

    /// Stage A/B/C with up to [`MAX_PARSE_ATTEMPTS`] LM round-trips.
    async fn parse_with_retries(
        &self,
        mut raw: String,
        state: &mut LoopState,
        ctx: &RunContext,
    ) -> Result<Action, ReactError> {
        let mut attempt = 1;
        loop {
            match parse_action(&raw, state) {
                Ok(action) => return Ok(action),
                Err(err) => {
                    warn!(attempt, %err, "react action rejected");
                    if attempt >= MAX_PARSE_ATTEMPTS {
                        return Err(ReactError::ParseExhausted {
                            attempts: attempt,
                            message: err.to_string(),
                        });
                    }
                    let prompt = retry_prompt(state, attempt, &describe(&err));
                    state.messages.push(LmMessage::user(prompt));
                    raw = self.call_model(state, ctx).await?;
                    state.messages.push(LmMessage::assistant(raw.clone()));
                    attempt += 1;
                }
            }
        }
    }

    /// Dispatch a coerced action, returning the recorded observation (if any).
    async fn act(
        &self,
        action: &Action,
        workflow: &Workflow,
        state: &mut LoopState,
        ctx: &RunContext,
    ) -> Result<Option<serde_json::Value>, ReactError> {
        let (node_id, params) = match action {
            Action::Reason { .. } | Action::Wait | Action::Finish => return Ok(None),
            Action::ExecuteNode { node_id, params, .. } => (node_id, params.clone()),
            Action::ErrorRecovery { node_id, .. } => (node_id, None),
        };

        let node = workflow
            .nodes
            .iter()
            .find(|n| &n.id == node_id)
            .ok_or_else(|| NodeExecError::MissingExecutor(node_id.to_string()))?;

        let mut inputs = conductor_protocol::NodeInputs::new();
        if let Some(p) = params {
            inputs.insert(node_id.clone(), p);
        }

        let output = tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => return Err(ReactError::Cancelled),
            result = self.executor.execute_node(node, &inputs, ctx) => result?,
        };

        info!(%node_id, "react loop executed node");
        state.executed_nodes.insert(node_id.clone(), output.clone());
        Ok(Some(output))
    }
}

fn describe(err: &ParseError) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_protocol::test_utils::{EchoNodeExecutor, ScriptedLmClient};
    use conductor_protocol::{NodeKind, RunId, WorkflowId};
    use conductor_workflow::{Node, NodeExecutorRegistry, Position, Workflow};

    fn workflow() -> Workflow {
        Workflow {
            id: WorkflowId::from("wf1"),
            name: "greet".into(),
            nodes: vec![Node {
                id: "n1".into(),
                kind: NodeKind::Custom("greeter".into()),
                config: serde_json::json!({}),
                position: Position::default(),
                retry_count: 0,
            }],
            edges: vec![],
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

    fn executor() -> Arc<DagExecutor> {
        let mut registry = NodeExecutorRegistry::new();
        registry.register(&NodeKind::Custom("greeter".into()), Arc::new(EchoNodeExecutor));
        Arc::new(DagExecutor::new(registry))
    }

    #[tokio::test]
    async fn runs_a_node_then_finishes() {
        let lm = Arc::new(ScriptedLmClient::new(vec![
            r#"{"type": "execute_node", "node_id": "n1"}"#.to_owned(),
            r#"{"type": "finish"}"#.to_owned(),
        ]));
        let orch = ReactOrchestrator::new(lm, executor());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let outcome = orch.run(&workflow(), ctx(), 10, 10, &tx).await.unwrap();
        assert!(matches!(outcome, LoopOutcome::Completed(_)));
        drop(tx);
        let mut saw_workflow_started = false;
        while let Some(event) = rx.recv().await {
            if matches!(event, ReactEvent::WorkflowStarted) {
                saw_workflow_started = true;
            }
        }
        assert!(saw_workflow_started);
    }

    #[tokio::test]
    async fn wait_suspends_without_erroring() {
        let lm = Arc::new(ScriptedLmClient::new(vec![r#"{"type": "wait"}"#.to_owned()]));
        let orch = ReactOrchestrator::new(lm, executor());
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let outcome = orch.run(&workflow(), ctx(), 10, 10, &tx).await.unwrap();
        assert!(matches!(outcome, LoopOutcome::Suspended));
    }

    #[tokio::test]
    async fn exhausting_parse_attempts_fails_the_loop() {
        let lm = Arc::new(ScriptedLmClient::new(vec!["not json".to_owned()]));
        let orch = ReactOrchestrator::new(lm, executor());
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let err = orch.run(&workflow(), ctx(), 10, 10, &tx).await.unwrap_err();
        assert!(matches!(err, ReactError::ParseExhausted { .. }));
    }

    #[tokio::test]
    async fn cancellation_before_the_first_call_aborts_the_run() {
        let lm = Arc::new(ScriptedLmClient::new(vec![r#"{"type": "finish"}"#.to_owned()]));
        let orch = ReactOrchestrator::new(lm, executor());
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut c = ctx();
        c.cancellation.cancel();
        let err = orch.run(&workflow(), c, 10, 10, &tx).await.unwrap_err();
        assert!(matches!(err, ReactError::Cancelled));
    }
}
