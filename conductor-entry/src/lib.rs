//! # conductor-entry — save-validate→run entry with bounded self-repair
//!
//! Mediates between persistence (C4's validator, the workflow repository)
//! and execution (C5). After a workflow is approved and the run is
//! authorized, this crate drives up to three execution attempts,
//! proposing a config-only patch and re-validating between failed
//! attempts that land in the recoverable error set (§4.4).

#![deny(missing_docs)]

pub mod event;
pub mod repair;
pub mod runner;

pub use event::{RepairEvent, StopReason};
pub use repair::Patch;
pub use runner::SelfRepairRunner;
