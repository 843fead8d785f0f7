//! Protocol boundaries (§1 "external collaborators", §4) — the interfaces
//! the core consumes, not what implements them. Mirrors the teacher's
//! `layer0` crate: one trait per boundary, each operation-defined rather
//! than mechanism-defined.

use crate::duration::DurationMs;
use crate::error::{CanvasError, LmError, NodeExecError, RepositoryError, ToolError};
use crate::id::{ConnectionId, NodeId, RunId, ToolId, WorkflowId};
use crate::value::{NodeKind, ToolEntryKind, ToolParamType, ToolStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// A read-only view of one node, passed to a [`NodeExecutor`]. Decoupled
/// from `conductor-workflow`'s full `Node` record so this crate has no
/// dependency on it (the dependency points the other way).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    /// The node's stable identifier.
    pub id: NodeId,
    /// The node's kind.
    pub kind: NodeKind,
    /// Free-form configuration, as saved on the node.
    pub config: serde_json::Value,
    /// How many times C5 should retry this node on a retryable failure.
    pub retry_count: u32,
    /// Per-node timeout; defaults to 30s if the node didn't override it.
    pub timeout: DurationMs,
}

/// Per-run context passed to every node execution (§4.2).
#[derive(Debug, Clone)]
pub struct RunContext {
    /// The workflow being run.
    pub workflow_id: WorkflowId,
    /// This run's identifier.
    pub run_id: RunId,
    /// The caller-supplied input to the run (consumed by `Input`/`Start` nodes).
    pub initial_input: serde_json::Value,
    /// Fires when the run is cancelled; executors should abort promptly.
    pub cancellation: CancellationToken,
}

/// Gathered inputs for one node: the union of its predecessors' outputs,
/// in edge-list order, keyed by the predecessor's id.
pub type NodeInputs = HashMap<NodeId, serde_json::Value>;

/// Dispatch target for a node kind (§4.2, §9 "explicit interface instead
/// of duck typing"). Implementations are registered by kind tag in a
/// `NodeExecutorRegistry` (see `conductor-workflow`).
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Execute one node given its gathered inputs and run context.
    async fn execute(
        &self,
        node: &NodeView,
        inputs: &NodeInputs,
        ctx: &RunContext,
    ) -> Result<serde_json::Value, NodeExecError>;
}

/// A tool parameter declaration, as read from a manifest (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    pub param_type: ToolParamType,
    /// Whether the parameter must be present.
    pub required: bool,
    /// Default value filled in when absent and optional.
    pub default: Option<serde_json::Value>,
    /// Closed set of allowed values, if any.
    pub enum_values: Option<Vec<serde_json::Value>>,
}

/// What the validator (C4) and tool node executor need to know about a
/// tool without depending on `conductor-tool`'s full registry type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    /// The tool's identifier.
    pub id: ToolId,
    /// The tool's unique name.
    pub name: String,
    /// Current lifecycle status.
    pub status: ToolStatus,
    /// Declared parameters.
    pub parameters: Vec<ToolParam>,
    /// How the tool is actually invoked.
    pub entry: ToolEntryKind,
}

/// Lookup boundary the workflow validator uses to check `tool_id`
/// references (§4.1). Kept separate from `conductor-tool`'s full engine
/// so the validator can depend on just this.
#[async_trait]
pub trait ToolRepository: Send + Sync {
    /// Fetch a tool by id. `Ok(None)` means "does not exist" — distinct
    /// from `Err`, which means the repository itself is unreachable
    /// (the validator's fail-closed rule hinges on this distinction).
    async fn find(&self, id: &ToolId) -> Result<Option<ToolSummary>, RepositoryError>;

    /// List published tools compatible with a failing tool (same
    /// parameter shape), used by C7's `tool_not_found` repair path.
    async fn find_compatible_published(&self, failing: &ToolId) -> Result<Vec<ToolSummary>, RepositoryError>;
}

/// Persistence boundary for workflows (§6 "Persisted state layout").
/// The validator runs before every write through this trait (§4.1).
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Persist a workflow. Callers MUST have already run the validator;
    /// this trait does not validate on your behalf.
    async fn save(&self, workflow: serde_json::Value) -> Result<(), RepositoryError>;

    /// Load a workflow by id.
    async fn load(&self, id: &WorkflowId) -> Result<serde_json::Value, RepositoryError>;
}

/// The LM collaborator: synchronous `invoke(messages) -> text`, nothing
/// more (§1, §4.3). Every suspension in the ReAct loop's reasoning step
/// happens exclusively inside this call.
#[async_trait]
pub trait LmClient: Send + Sync {
    /// Send the accumulated message log and return the model's raw text
    /// response (expected to decode as a §6 "ReAct action format" object).
    async fn invoke(&self, messages: &[crate::content::LmMessage]) -> Result<String, LmError>;
}

/// Errors from tool dispatch at the `ToolExecutor` boundary (used by
/// `conductor-tool`'s engine when invoking an implementation kind).
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Invoke the tool's implementation with validated, default-filled parameters.
    async fn call(&self, params: serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

/// The outbound half of one canvas client connection (§4.10, §6 "Canvas
/// wire protocol"). Implementations wrap a specific transport (WebSocket
/// or otherwise); `conductor-canvas` only needs to push a message and to
/// learn when a connection has died.
#[async_trait]
pub trait CanvasTransport: Send + Sync {
    /// This connection's identifier.
    fn connection_id(&self) -> &ConnectionId;

    /// Push one already-serialized message to the client. An error means
    /// the connection is dead; the caller removes it from its connection set.
    async fn send(&self, message: &serde_json::Value) -> Result<(), CanvasError>;
}
