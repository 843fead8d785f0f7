//! Typed ID wrappers for every identifier that crosses a protocol boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed IDs are plain strings underneath — no UUID format is enforced.
/// The wrapper exists so a `NodeId` and a `ToolId` can't be swapped by
/// accident at a call site; the compiler catches it, the wire format
/// doesn't change.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to `String`.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(WorkflowId, "Unique identifier for a workflow.");
typed_id!(NodeId, "Unique identifier for a node within a workflow.");
typed_id!(EdgeId, "Unique identifier for an edge within a workflow.");
typed_id!(ToolId, "Unique identifier for a registered tool.");
typed_id!(RunId, "Unique identifier for one workflow run (one attempt sequence).");
typed_id!(AgentId, "Unique identifier for a long-lived agent instance.");
typed_id!(SessionId, "Unique identifier for a conversation session.");
typed_id!(ConnectionId, "Unique identifier for a canvas client connection.");
typed_id!(ConfirmId, "Unique identifier for a run-confirmation handshake.");
