#![deny(missing_docs)]
//! # conductor — umbrella crate
//!
//! A single import surface for the agent orchestration runtime.
//! Re-exports each component crate behind a feature flag, plus a
//! `prelude` module for the common composition-root path.

#[cfg(feature = "core")]
pub use conductor_knowledge;
#[cfg(feature = "canvas")]
pub use conductor_canvas;
#[cfg(feature = "entry")]
pub use conductor_entry;
#[cfg(feature = "lifecycle")]
pub use conductor_lifecycle;
#[cfg(feature = "core")]
pub use conductor_protocol;
#[cfg(feature = "provider-anthropic")]
pub use conductor_provider_anthropic;
#[cfg(feature = "react")]
pub use conductor_react;
#[cfg(feature = "state-memory")]
pub use conductor_state_memory;
#[cfg(feature = "core")]
pub use conductor_tool;
#[cfg(feature = "core")]
pub use conductor_workflow;

pub mod config;

pub use config::Config;

/// Happy-path imports for composing a conductor runtime.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use conductor_protocol::{
        AgentId, CanvasTransport, DurationMs, LmClient, NodeExecutor, RunContext, ToolExecutor,
        ToolRepository, WorkflowId, WorkflowRepository,
    };

    #[cfg(feature = "core")]
    pub use conductor_workflow::{validate, DagExecutor, Edge, Node, Workflow};

    #[cfg(feature = "react")]
    pub use conductor_react::ReactOrchestrator;

    #[cfg(feature = "entry")]
    pub use conductor_entry::SelfRepairRunner;

    #[cfg(feature = "lifecycle")]
    pub use conductor_lifecycle::LifecycleApi;

    #[cfg(feature = "canvas")]
    pub use conductor_canvas::CanvasFabric;

    #[cfg(feature = "state-memory")]
    pub use conductor_state_memory::{MemoryToolStore, MemoryWorkflowStore};

    #[cfg(feature = "provider-anthropic")]
    pub use conductor_provider_anthropic::Anthropic;

    pub use crate::Config;
}
