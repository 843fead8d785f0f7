//! Dispatch-by-kind-tag registry for [`conductor_protocol::NodeExecutor`]
//! implementations (§4.2, §9 "explicit interface instead of duck typing").

use conductor_protocol::{NodeExecutor, NodeKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps a node kind's stable tag to the executor that runs it. Built-in
/// kinds (`input`, `start`, `end`, `output`, `default`) never need an
/// entry here — they're satisfied by the runtime itself.
#[derive(Default)]
pub struct NodeExecutorRegistry {
    executors: HashMap<String, Arc<dyn NodeExecutor>>,
}

impl NodeExecutorRegistry {
    /// Build an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor for the given kind.
    pub fn register(&mut self, kind: &NodeKind, executor: Arc<dyn NodeExecutor>) {
        self.executors.insert(kind.tag(), executor);
    }

    /// Whether a kind is satisfied: either built-in, or has a registered executor.
    pub fn is_satisfied(&self, kind: &NodeKind) -> bool {
        kind.is_builtin() || self.executors.contains_key(&kind.tag())
    }

    /// Look up the executor for a kind, if any.
    pub fn get(&self, kind: &NodeKind) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(&kind.tag()).cloned()
    }
}
