//! # conductor-protocol — protocol traits and typed value objects
//!
//! This crate defines the boundaries the agent orchestration runtime
//! consumes without owning: node execution, tool lookup, workflow
//! persistence, and the LM collaborator. Every trait here is
//! operation-defined, not mechanism-defined — `NodeExecutor::execute`
//! means "run this node to completion", not "make an HTTP call" or
//! "spawn a script interpreter". That's what makes implementations
//! swappable without touching the components that depend on this crate.
//!
//! Everything else (`conductor-tool`, `conductor-workflow`,
//! `conductor-react`, ...) depends on this crate; this crate depends on
//! nothing in the workspace.

#![deny(missing_docs)]

pub mod content;
pub mod duration;
pub mod error;
pub mod id;
pub mod traits;
pub mod value;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use content::{LmMessage, Role};
pub use duration::DurationMs;
pub use error::{
    CanvasError, ErrorKind, LifecycleError, LmError, NodeExecError, ReactError, RepositoryError,
    ToolError, ValidationError, ValidationIssue,
};
pub use id::{AgentId, ConfirmId, ConnectionId, EdgeId, NodeId, RunId, SessionId, ToolId, WorkflowId};
pub use traits::{
    CanvasTransport, LmClient, NodeExecutor, NodeInputs, NodeView, RunContext, ToolExecutor,
    ToolParam, ToolRepository, ToolSummary, WorkflowRepository,
};
pub use value::{CallerType, NodeKind, ToolEntryKind, ToolParamType, ToolStatus};
