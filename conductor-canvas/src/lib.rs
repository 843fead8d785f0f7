//! Canvas synchronization fabric (C9): per-workflow connection registry,
//! reliable broadcast with retry/backoff, inbound dedup, and snapshot
//! diffing.

#![deny(missing_docs)]

pub mod dedup;
pub mod fabric;
pub mod message;
pub mod registry;
pub mod reliability;
pub mod snapshot;

pub use dedup::InboundDedup;
pub use fabric::CanvasFabric;
pub use message::{diff_to_messages, CanvasMessage, ClientAction, ConfirmDecision, ExecutionStatusKind};
pub use registry::ConnectionRegistry;
pub use reliability::{AckTracker, SweepAction, DEFAULT_MAX_RETRIES};
pub use snapshot::{diff, CanvasDiff, CanvasSnapshot, EdgeSnapshot, ModifiedNode, NodeChanges, NodeSnapshot, Position};
