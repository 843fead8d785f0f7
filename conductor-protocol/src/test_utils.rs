//! Shared test doubles, gated behind the `test-utils` feature — mirrors
//! `layer0::test_utils` (`EchoOperator`, `InMemoryStore`, ...).

use crate::error::{CanvasError, LmError, NodeExecError, RepositoryError};
use crate::id::{ConnectionId, ToolId};
use crate::traits::{
    CanvasTransport, LmClient, NodeExecutor, NodeInputs, NodeView, RunContext, ToolRepository,
    ToolSummary,
};
use async_trait::async_trait;
use std::sync::Mutex;

/// A [`NodeExecutor`] that echoes its gathered inputs back as output.
/// Useful for exercising the DAG executor without a real node kind.
pub struct EchoNodeExecutor;

#[async_trait]
impl NodeExecutor for EchoNodeExecutor {
    async fn execute(
        &self,
        _node: &NodeView,
        inputs: &NodeInputs,
        _ctx: &RunContext,
    ) -> Result<serde_json::Value, NodeExecError> {
        Ok(serde_json::to_value(inputs).unwrap_or(serde_json::Value::Null))
    }
}

/// A [`NodeExecutor`] that always fails, optionally retryably.
pub struct FailingNodeExecutor {
    /// The failure message returned.
    pub message: String,
    /// Whether the failure should be retried by C5's retry policy.
    pub retryable: bool,
}

#[async_trait]
impl NodeExecutor for FailingNodeExecutor {
    async fn execute(
        &self,
        _node: &NodeView,
        _inputs: &NodeInputs,
        _ctx: &RunContext,
    ) -> Result<serde_json::Value, NodeExecError> {
        Err(NodeExecError::Failed { message: self.message.clone(), retryable: self.retryable })
    }
}

/// An [`LmClient`] that replays a fixed transcript of responses, one per
/// call, and returns the last response repeatedly once exhausted. Used
/// to drive deterministic ReAct loop tests.
pub struct ScriptedLmClient {
    responses: Mutex<Vec<String>>,
    cursor: Mutex<usize>,
}

impl ScriptedLmClient {
    /// Build a scripted client from an ordered list of raw text responses.
    pub fn new(responses: Vec<String>) -> Self {
        Self { responses: Mutex::new(responses), cursor: Mutex::new(0) }
    }
}

#[async_trait]
impl LmClient for ScriptedLmClient {
    async fn invoke(&self, _messages: &[crate::content::LmMessage]) -> Result<String, LmError> {
        let responses = self.responses.lock().unwrap();
        let mut cursor = self.cursor.lock().unwrap();
        if responses.is_empty() {
            return Err(LmError::InvalidRequest("no scripted responses remain".into()));
        }
        let idx = (*cursor).min(responses.len() - 1);
        *cursor += 1;
        Ok(responses[idx].clone())
    }
}

/// A [`ToolRepository`] backed by an in-memory list, for validator and
/// self-repair tests that don't need the full tool engine.
pub struct InMemoryToolRepository {
    tools: Mutex<Vec<ToolSummary>>,
}

impl InMemoryToolRepository {
    /// Build a repository seeded with the given tools.
    pub fn new(tools: Vec<ToolSummary>) -> Self {
        Self { tools: Mutex::new(tools) }
    }
}

#[async_trait]
impl ToolRepository for InMemoryToolRepository {
    async fn find(&self, id: &ToolId) -> Result<Option<ToolSummary>, RepositoryError> {
        Ok(self.tools.lock().unwrap().iter().find(|t| &t.id == id).cloned())
    }

    async fn find_compatible_published(&self, failing: &ToolId) -> Result<Vec<ToolSummary>, RepositoryError> {
        let tools = self.tools.lock().unwrap();
        let target_param_count = tools
            .iter()
            .find(|t| &t.id == failing)
            .map(|t| t.parameters.len());
        Ok(tools
            .iter()
            .filter(|t| {
                &t.id != failing
                    && t.status == crate::value::ToolStatus::Published
                    && target_param_count.is_none_or(|n| t.parameters.len() == n)
            })
            .cloned()
            .collect())
    }
}

/// A [`ToolRepository`] that always reports unreachable, for exercising
/// the fail-closed `tool_repository_unavailable` path.
pub struct UnavailableToolRepository;

#[async_trait]
impl ToolRepository for UnavailableToolRepository {
    async fn find(&self, _id: &ToolId) -> Result<Option<ToolSummary>, RepositoryError> {
        Err(RepositoryError::Unavailable("tool repository offline".into()))
    }

    async fn find_compatible_published(&self, _failing: &ToolId) -> Result<Vec<ToolSummary>, RepositoryError> {
        Err(RepositoryError::Unavailable("tool repository offline".into()))
    }
}

/// A [`CanvasTransport`] that records every message it receives in
/// memory, for canvas fabric tests that don't need a real socket.
pub struct RecordingCanvasTransport {
    id: ConnectionId,
    /// Every message passed to `send`, in order.
    pub received: Mutex<Vec<serde_json::Value>>,
    /// When set, `send` fails with this connection id instead of recording.
    pub fail: bool,
}

impl RecordingCanvasTransport {
    /// Build a transport with the given connection id.
    pub fn new(id: ConnectionId) -> Self {
        Self { id, received: Mutex::new(Vec::new()), fail: false }
    }

    /// Build a transport whose `send` always fails.
    pub fn failing(id: ConnectionId) -> Self {
        Self { id, received: Mutex::new(Vec::new()), fail: true }
    }
}

#[async_trait]
impl CanvasTransport for RecordingCanvasTransport {
    fn connection_id(&self) -> &ConnectionId {
        &self.id
    }

    async fn send(&self, message: &serde_json::Value) -> Result<(), CanvasError> {
        if self.fail {
            return Err(CanvasError::ConnectionClosed(self.id.to_string()));
        }
        self.received.lock().unwrap().push(message.clone());
        Ok(())
    }
}
