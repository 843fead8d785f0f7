//! # conductor-tool — hot-reloadable tool catalog (C3)
//!
//! Loads tool manifests from a directory ([`manifest`]), indexes them by
//! name/tag/category ([`registry`]), validates call parameters
//! ([`validator`]), enforces per-tool-name concurrency
//! ([`concurrency`]), and ties it all together behind one `execute` call
//! that records every outcome to [`conductor_knowledge`] ([`engine`]).

#![deny(missing_docs)]

pub mod concurrency;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod registry;
pub mod tool;
pub mod validator;

pub use concurrency::{ConcurrencyController, ConcurrencySlot, ToolConcurrencyMetrics};
pub use engine::{CallContext, HttpToolExecutor, ToolCallOutcome, ToolEngine};
pub use error::ManifestError;
pub use manifest::ToolManifest;
pub use registry::{ToolEvent, ToolRegistry};
pub use tool::{Tool, ToolStatusError};
