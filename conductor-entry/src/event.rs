//! The self-repair attempt event stream (§4.4, §6 "Run event stream").

use conductor_protocol::ErrorKind;
use serde::Serialize;

/// Why the self-repair loop gave up without reaching `workflow_complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// All three attempts ran and failed.
    ConsecutiveFailures,
    /// A recoverable error occurred but no patch could be proposed.
    NoPatchAvailable,
    /// A proposed patch failed re-validation (C4).
    ValidationFailed,
}

/// One event in the self-repair attempt stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RepairEvent {
    /// A new execution attempt has begun.
    WorkflowReactLoopStarted {
        /// 1-indexed attempt number.
        attempt: u32,
    },
    /// An intermediate attempt failed; the loop may still patch and retry.
    WorkflowAttemptFailed {
        /// 1-indexed attempt number.
        attempt: u32,
        /// The error kind C5 reported.
        error_type: ErrorKind,
        /// Free-text detail.
        error: String,
    },
    /// A patch passed re-validation, was persisted, and the run will retry.
    WorkflowReactPatchApplied {
        /// 1-indexed attempt number this patch was proposed during.
        attempt: u32,
        /// Developer-readable description of what changed.
        patch: String,
    },
    /// The run finished successfully.
    WorkflowComplete {
        /// The final value.
        output: serde_json::Value,
    },
    /// Attempts are exhausted; this always precedes the terminal `workflow_error`.
    WorkflowTerminationReport {
        /// Why the loop stopped.
        stop_reason: StopReason,
        /// Total attempts made.
        attempts: u32,
    },
    /// The terminal, unrecoverable failure. Never emitted for an
    /// intermediate attempt — only ever the last.
    WorkflowError {
        /// The attempt number this failure was recorded on.
        attempt: u32,
        /// The error kind C5 reported.
        error_type: ErrorKind,
        /// Free-text detail.
        error: String,
    },
}
