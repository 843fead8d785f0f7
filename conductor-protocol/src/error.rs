//! The closed error-kind taxonomy (§7) plus per-boundary error enums.
//!
//! `ErrorKind` is the stable, serializable tag every terminal event
//! carries (`error_type` / `kind` fields in the wire protocol). The
//! `thiserror` enums below are the Rust-side errors each subsystem
//! returns; each has a `.kind()` method mapping it onto the shared
//! taxonomy so the interface layer never has to pattern-match five
//! different error types to decide what a UI should show.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of machine-readable error kinds (§7).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Any C4 validator rejection.
    ValidationError,
    /// ReAct stage A/B parse failure.
    ParseError,
    /// ReAct stage C business-rule failure.
    BusinessError,
    /// Referenced tool does not exist.
    ToolNotFound,
    /// Referenced tool exists but is deprecated.
    ToolDeprecated,
    /// A tool's `execute` call failed.
    ToolExecutionFailed,
    /// A node executor failed; carries whether the C5 retry policy applies.
    NodeExecutionError,
    /// A node execution or LM call exceeded its deadline.
    Timeout,
    /// A cancellation token fired.
    Cancelled,
    /// A lifecycle state machine transition was rejected.
    InvalidTransition,
    /// An admission path (scheduler, concurrency controller, ...) rejected on quota.
    QuotaExceeded,
    /// A required repository/adapter was unreachable.
    RepositoryUnavailable,
    /// The caller's request violated the contract (shape, missing field).
    InvalidRequest,
    /// The caller's request was well-formed but invalid given current state.
    InvalidContext,
    /// A canvas `send` failed; the connection has been removed.
    ConnectionClosed,
}

/// A single structured validation failure (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Stable error code, e.g. `"duplicate_node_id"`.
    pub code: String,
    /// Developer-readable message.
    pub message: String,
    /// JSON-pointer-ish path to the offending element, e.g. `"nodes[1].config.tool_id"`.
    pub path: String,
    /// Structured extra detail (duplicate ids, the cycle, etc).
    #[serde(default)]
    pub meta: serde_json::Value,
}

impl ValidationIssue {
    /// Build a validation issue.
    pub fn new(code: impl Into<String>, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            path: path.into(),
            meta: serde_json::Value::Null,
        }
    }

    /// Attach structured metadata.
    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }
}

/// Errors from the workflow validator (C4). Carries the full issue list
/// so a caller never has to re-derive "what's wrong" from a single string.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ValidationError {
    /// One or more structural/semantic checks failed.
    #[error("workflow failed validation: {} issue(s)", .0.len())]
    Invalid(Vec<ValidationIssue>),

    /// A repository required to validate (e.g. the tool repository) was unreachable.
    #[error("repository unavailable during validation: {0}")]
    RepositoryUnavailable(String),
}

impl ValidationError {
    /// The shared error-kind tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::Invalid(_) => ErrorKind::ValidationError,
            ValidationError::RepositoryUnavailable(_) => ErrorKind::RepositoryUnavailable,
        }
    }
}

/// Errors from node execution (C5).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum NodeExecError {
    /// The node's kind has no registered executor.
    #[error("no executor registered for node kind {0}")]
    MissingExecutor(String),

    /// The executor ran and failed. `retryable` drives the C5 retry policy.
    #[error("node execution failed: {message}")]
    Failed {
        /// Developer-readable failure detail.
        message: String,
        /// Whether the C5 retry policy should retry this node.
        retryable: bool,
    },

    /// The node's deadline elapsed before the executor returned.
    #[error("node execution timed out")]
    Timeout,

    /// A run-scoped cancellation token fired.
    #[error("node execution cancelled")]
    Cancelled,
}

impl NodeExecError {
    /// The shared error-kind tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NodeExecError::MissingExecutor(_) => ErrorKind::ValidationError,
            NodeExecError::Failed { .. } => ErrorKind::NodeExecutionError,
            NodeExecError::Timeout => ErrorKind::Timeout,
            NodeExecError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether the C5 retry policy should retry this failure.
    pub fn retryable(&self) -> bool {
        matches!(self, NodeExecError::Failed { retryable: true, .. } | NodeExecError::Timeout)
    }
}

/// Errors from the tool engine (C3).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool with this name is registered.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The tool exists but its status is `deprecated`.
    #[error("tool deprecated: {0}")]
    Deprecated(String),

    /// Parameter validation rejected the call; carries the structured issues.
    #[error("invalid parameters: {} issue(s)", .0.len())]
    InvalidParams(Vec<ValidationIssue>),

    /// The concurrency controller rejected admission (queue full / ceiling hit).
    #[error("tool concurrency quota exceeded for {0}")]
    QuotaExceeded(String),

    /// The underlying implementation (builtin/http/script) failed.
    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),

    /// Catch-all for adapter failures (manifest directory unreadable, etc).
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ToolError {
    /// The shared error-kind tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::NotFound(_) => ErrorKind::ToolNotFound,
            ToolError::Deprecated(_) => ErrorKind::ToolDeprecated,
            ToolError::InvalidParams(_) => ErrorKind::InvalidRequest,
            ToolError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            ToolError::ExecutionFailed(_) => ErrorKind::ToolExecutionFailed,
            ToolError::Other(_) => ErrorKind::ToolExecutionFailed,
        }
    }
}

/// Errors from the ReAct loop (C6).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReactError {
    /// The LM client call failed.
    #[error("model call failed: {0}")]
    Model(String),

    /// Stage A/B/C of action parsing failed after exhausting retries.
    #[error("action parsing failed after {attempts} attempt(s): {message}")]
    ParseExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Final failure detail.
        message: String,
    },

    /// A node execution invoked from the loop failed non-retryably.
    #[error("node execution error: {0}")]
    NodeExec(#[from] NodeExecError),

    /// The run was cancelled at a suspension point.
    #[error("run cancelled")]
    Cancelled,
}

impl ReactError {
    /// The shared error-kind tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReactError::Model(_) => ErrorKind::NodeExecutionError,
            ReactError::ParseExhausted { .. } => ErrorKind::ParseError,
            ReactError::NodeExec(e) => e.kind(),
            ReactError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Errors from the lifecycle manager & scheduler (C8).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The requested state transition is not in the transition table.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// The state the instance was in.
        from: String,
        /// The state that was requested.
        to: String,
    },

    /// Admission was rejected by a quota (global concurrency, CPU/mem/GPU, or load).
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The referenced agent instance does not exist.
    #[error("agent not found: {0}")]
    NotFound(String),
}

impl LifecycleError {
    /// The shared error-kind tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            LifecycleError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            LifecycleError::NotFound(_) => ErrorKind::InvalidRequest,
        }
    }
}

/// Errors from the canvas sync fabric (C9).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CanvasError {
    /// `send` failed on a specific connection; it has been removed from the set.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The target workflow has no registered connections.
    #[error("no connections for workflow: {0}")]
    NoConnections(String),
}

impl CanvasError {
    /// The shared error-kind tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CanvasError::ConnectionClosed(_) => ErrorKind::ConnectionClosed,
            CanvasError::NoConnections(_) => ErrorKind::InvalidRequest,
        }
    }
}

/// Errors from the LM client boundary.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LmError {
    /// The provider rejected the request (bad auth, bad payload).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider is rate-limiting or overloaded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The call exceeded its deadline.
    #[error("model call timed out")]
    Timeout,

    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("transport error: {0}")]
    Transport(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl LmError {
    /// The shared error-kind tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LmError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            LmError::ServiceUnavailable(_) => ErrorKind::RepositoryUnavailable,
            LmError::Timeout => ErrorKind::Timeout,
            LmError::Transport(_) => ErrorKind::RepositoryUnavailable,
        }
    }
}

/// Errors from a repository adapter (workflow/tool persistence).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend is unreachable or returned an unexpected failure.
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// The shared error-kind tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::NotFound(_) => ErrorKind::InvalidRequest,
            RepositoryError::Unavailable(_) => ErrorKind::RepositoryUnavailable,
        }
    }
}
