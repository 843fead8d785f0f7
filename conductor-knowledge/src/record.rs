//! The tool-call record (§3) and its append-only store (§4.8, C2).

use chrono::{DateTime, Utc};
use conductor_protocol::{CallerType, DurationMs};
use serde::{Deserialize, Serialize};

/// Outcome of a single tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallOutcome {
    /// The tool returned a result.
    Success {
        /// The tool's output.
        output: serde_json::Value,
    },
    /// The tool call failed.
    Error {
        /// Machine-readable error kind tag.
        error_kind: String,
        /// Developer-readable detail.
        message: String,
    },
}

impl CallOutcome {
    /// Whether this outcome represents success.
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success { .. })
    }
}

/// Record of one tool invocation (§3 "Tool-call record"). Appended once,
/// never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Name of the tool invoked.
    pub tool_name: String,
    /// Who initiated the call.
    pub caller_type: CallerType,
    /// Identifier of the caller (node id, agent id, ...).
    pub caller_id: String,
    /// The session this call happened within, if any.
    pub session_id: Option<String>,
    /// The workflow this call happened within, if any.
    pub workflow_id: Option<String>,
    /// The run this call happened within, if any.
    pub run_id: Option<String>,
    /// A snapshot of the parameters passed (post default-filling).
    pub params: serde_json::Value,
    /// What happened.
    pub outcome: CallOutcome,
    /// How long the call took.
    pub duration: DurationMs,
    /// Correlation id for distributed tracing.
    pub trace_id: String,
    /// When the call was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ToolCallRecord {
    /// Build a successful record.
    #[allow(clippy::too_many_arguments)]
    pub fn success(
        tool_name: impl Into<String>,
        caller_type: CallerType,
        caller_id: impl Into<String>,
        params: serde_json::Value,
        output: serde_json::Value,
        duration: DurationMs,
        trace_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            caller_type,
            caller_id: caller_id.into(),
            session_id: None,
            workflow_id: None,
            run_id: None,
            params,
            outcome: CallOutcome::Success { output },
            duration,
            trace_id: trace_id.into(),
            timestamp,
        }
    }

    /// Build a failed record.
    #[allow(clippy::too_many_arguments)]
    pub fn error(
        tool_name: impl Into<String>,
        caller_type: CallerType,
        caller_id: impl Into<String>,
        params: serde_json::Value,
        error_kind: impl Into<String>,
        message: impl Into<String>,
        duration: DurationMs,
        trace_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            caller_type,
            caller_id: caller_id.into(),
            session_id: None,
            workflow_id: None,
            run_id: None,
            params,
            outcome: CallOutcome::Error { error_kind: error_kind.into(), message: message.into() },
            duration,
            trace_id: trace_id.into(),
            timestamp,
        }
    }
}

/// Query filter for `KnowledgeStore::get_calls`/`summarize`.
#[derive(Debug, Clone, Default)]
pub struct CallFilter {
    /// Restrict to this session.
    pub session_id: Option<String>,
    /// Restrict to this tool name.
    pub tool_name: Option<String>,
    /// Restrict to this caller id.
    pub caller_id: Option<String>,
    /// Restrict to calls at or after this time.
    pub since: Option<DateTime<Utc>>,
    /// Restrict to calls at or before this time.
    pub until: Option<DateTime<Utc>>,
    /// Cap the number of records returned (most recent first).
    pub limit: Option<usize>,
}

impl CallFilter {
    fn matches(&self, record: &ToolCallRecord) -> bool {
        if let Some(s) = &self.session_id {
            if record.session_id.as_deref() != Some(s.as_str()) {
                return false;
            }
        }
        if let Some(t) = &self.tool_name {
            if &record.tool_name != t {
                return false;
            }
        }
        if let Some(c) = &self.caller_id {
            if &record.caller_id != c {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.timestamp > until {
                return false;
            }
        }
        true
    }

    pub(crate) fn apply<'a>(&self, records: impl Iterator<Item = &'a ToolCallRecord>) -> Vec<&'a ToolCallRecord> {
        let mut matched: Vec<&ToolCallRecord> = records.filter(|r| self.matches(r)).collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

/// Aggregate statistics over a filtered set of calls.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CallSummary {
    /// Total matching calls.
    pub total_calls: usize,
    /// Successful calls.
    pub success_count: usize,
    /// Failed calls.
    pub error_count: usize,
    /// 50th percentile duration, in milliseconds.
    pub p50_ms: u64,
    /// 95th percentile duration, in milliseconds.
    pub p95_ms: u64,
    /// 99th percentile duration, in milliseconds.
    pub p99_ms: u64,
}

pub(crate) fn summarize(records: &[&ToolCallRecord]) -> CallSummary {
    if records.is_empty() {
        return CallSummary::default();
    }
    let mut durations: Vec<u64> = records.iter().map(|r| r.duration.as_millis()).collect();
    durations.sort_unstable();
    let percentile = |p: f64| -> u64 {
        let idx = ((durations.len() as f64 - 1.0) * p).round() as usize;
        durations[idx.min(durations.len() - 1)]
    };
    CallSummary {
        total_calls: records.len(),
        success_count: records.iter().filter(|r| r.outcome.is_success()).count(),
        error_count: records.iter().filter(|r| !r.outcome.is_success()).count(),
        p50_ms: percentile(0.50),
        p95_ms: percentile(0.95),
        p99_ms: percentile(0.99),
    }
}
