//! Closed-set value objects shared across every component (C1, §3).

use serde::{Deserialize, Serialize};

/// The closed set of node kinds (§3 "Workflow").
///
/// `Custom` exists only so an unrecognized kind read back from
/// persistence has somewhere to go *before* validation rejects it —
/// validation treats `Custom` as "missing executor" unless one was
/// registered for that exact tag, it is not a silent escape hatch.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point that receives the run's initial input.
    Input,
    /// A start node of the main subgraph.
    Start,
    /// A generic pass-through / no-op node.
    Default,
    /// A data-shaping node (no side effects).
    Transform,
    /// An HTTP call node.
    Http,
    /// A script node in language A (e.g. Python).
    ScriptA,
    /// A script node in language B (e.g. JavaScript).
    ScriptB,
    /// A node that invokes a registered tool.
    Tool,
    /// An image-generation/processing node.
    Image,
    /// An end node of the main subgraph.
    End,
    /// A terminal output-shaping node.
    Output,
    /// Unrecognized kind; always rejected by validation unless a
    /// matching executor was explicitly registered for the tag.
    Custom(String),
}

impl NodeKind {
    /// Whether this kind is satisfied by the runtime itself (no registered
    /// executor required). `Input`, `Start`, `End`, `Output`, and `Default`
    /// are built-in; everything else needs a `NodeExecutor`.
    pub fn is_builtin(&self) -> bool {
        matches!(
            self,
            NodeKind::Input | NodeKind::Start | NodeKind::End | NodeKind::Output | NodeKind::Default
        )
    }

    /// A stable string tag, used as the registry key for `NodeExecutor`
    /// lookup and in wire messages.
    pub fn tag(&self) -> String {
        match self {
            NodeKind::Input => "input".to_string(),
            NodeKind::Start => "start".to_string(),
            NodeKind::Default => "default".to_string(),
            NodeKind::Transform => "transform".to_string(),
            NodeKind::Http => "http".to_string(),
            NodeKind::ScriptA => "script_a".to_string(),
            NodeKind::ScriptB => "script_b".to_string(),
            NodeKind::Tool => "tool".to_string(),
            NodeKind::Image => "image".to_string(),
            NodeKind::End => "end".to_string(),
            NodeKind::Output => "output".to_string(),
            NodeKind::Custom(s) => s.clone(),
        }
    }
}

/// Declared type of a tool parameter (§3 "Tool").
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolParamType {
    /// UTF-8 string.
    String,
    /// Any JSON number.
    Number,
    /// `true`/`false`.
    Boolean,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl ToolParamType {
    /// Whether `value`'s JSON shape matches this declared type.
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            ToolParamType::String => value.is_string(),
            ToolParamType::Number => value.is_number(),
            ToolParamType::Boolean => value.is_boolean(),
            ToolParamType::Object => value.is_object(),
            ToolParamType::Array => value.is_array(),
        }
    }
}

/// Tool lifecycle status (§3 "Tool"). Transitions are restricted — only
/// `Testing -> Published` is reachable via the publish action; see
/// `conductor_tool::registry::ToolRegistry::publish`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// Newly created, not yet exercised.
    Draft,
    /// Under active testing.
    Testing,
    /// Generally available; eligible for workflow nodes.
    Published,
    /// Retired; existing references are flagged by the validator.
    Deprecated,
}

/// Implementation kind for a tool's entry point (§6 "Tool manifest format").
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolEntryKind {
    /// Resolved in-process by name.
    Builtin {
        /// The builtin handler's registered name.
        handler: String,
    },
    /// Invoked over HTTP.
    Http {
        /// The endpoint URL.
        url: String,
    },
    /// Invoked via a language-A (e.g. Python) script runner.
    ScriptA {
        /// The handler/entry-point identifier within the script runner.
        handler: String,
    },
    /// Invoked via a language-B (e.g. JavaScript) script runner.
    ScriptB {
        /// The handler/entry-point identifier within the script runner.
        handler: String,
    },
}

/// Who initiated a tool call (§3 "Tool-call record").
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerType {
    /// A tool-kind workflow node invoked the tool during C5 execution.
    WorkflowNode,
    /// A conversational agent invoked the tool outside a workflow run.
    ConversationAgent,
    /// Future caller kinds.
    Custom(String),
}
