//! # conductor-workflow — graph validation & DAG execution
//!
//! The workflow data model plus its two load-bearing algorithms (C4, C5):
//!
//! - [`validator`]: fail-closed structural and semantic checks run before
//!   every persistence write (§4.1).
//! - [`executor`]: topological scheduling, per-node timeout/retry, and the
//!   run event stream (§4.2).
//!
//! [`toposort`] is shared by both: the validator uses it to detect cycles,
//! the executor uses it to compute scheduling order.

#![deny(missing_docs)]

pub mod executor;
pub mod model;
pub mod registry;
pub mod toposort;
pub mod validator;

pub use executor::{DagExecutor, WorkflowEvent};
pub use model::{Edge, Node, Position, Workflow};
pub use registry::NodeExecutorRegistry;
pub use toposort::topological_order;
pub use validator::{normalize, validate};
