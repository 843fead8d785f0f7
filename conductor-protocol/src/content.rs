//! The message shape crossing the LM client boundary.
//!
//! The spec narrows the LM contract to a synchronous
//! `invoke(messages) -> text`; there is no tool-use wire format, no
//! streaming, no multimodal content here — the ReAct contract is a JSON
//! object embedded in the returned text (§6 "ReAct action format"), not
//! a provider-native tool-calling API.

use serde::{Deserialize, Serialize};

/// Who authored a message in the conversation sent to the LM.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The orchestrator's system prompt (rules, available nodes, exemplars).
    System,
    /// An observation or prior assistant output fed back into the loop.
    User,
    /// A prior LM response.
    Assistant,
}

/// One message in the conversation sent to `LmClient::invoke`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmMessage {
    /// The message author.
    pub role: Role,
    /// Plain-text content.
    pub content: String,
}

impl LmMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}
