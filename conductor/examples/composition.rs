//! A minimal composition root: build a two-node workflow, validate it,
//! run it through the self-repair entry, and print the result.
//!
//! Run with:
//!
//! ```sh
//! LM_API_KEY=unused cargo run --example composition -p conductor --features entry,state-memory
//! ```

use conductor::prelude::*;
use conductor_protocol::{NodeKind, RunContext, RunId, WorkflowId};
use conductor_workflow::{Edge, Node, NodeExecutorRegistry, Workflow};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    tracing::info!(lm_base_url = ?config.lm_base_url, "starting composition example");

    let workflow = Workflow {
        id: WorkflowId::from("demo-workflow"),
        name: "greeting".into(),
        nodes: vec![
            Node { id: "in".into(), kind: NodeKind::Input, config: serde_json::Value::Null, position: Default::default(), retry_count: 0 },
            Node { id: "out".into(), kind: NodeKind::End, config: serde_json::Value::Null, position: Default::default(), retry_count: 0 },
        ],
        edges: vec![Edge { id: "in-out".into(), source: "in".into(), target: "out".into() }],
    };

    let tool_repo = Arc::new(MemoryToolStore::new());
    let workflow_repo = Arc::new(MemoryWorkflowStore::new());
    let registry = NodeExecutorRegistry::new();

    let validated = conductor_workflow::validate(&workflow, tool_repo.as_ref(), &registry).await?;
    workflow_repo.save(serde_json::to_value(&validated)?).await?;

    let executor = Arc::new(DagExecutor::new(registry));
    let runner = SelfRepairRunner::new(workflow_repo, tool_repo, executor);

    let ctx = RunContext {
        workflow_id: validated.id.clone(),
        run_id: RunId::from("run-1"),
        initial_input: serde_json::json!({"greeting": "hello"}),
        cancellation: CancellationToken::new(),
    };

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move { while let Some(event) = events_rx.recv().await {
        tracing::info!(?event, "repair event");
    }});

    match runner.run(validated, ctx, &events_tx).await {
        Ok(output) => println!("workflow completed: {output}"),
        Err(stop_reason) => println!("workflow gave up: {stop_reason:?}"),
    }

    Ok(())
}
