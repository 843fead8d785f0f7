//! The `Tool` aggregate (§3 "Tool").

use chrono::{DateTime, Utc};
use conductor_protocol::{ToolEntryKind, ToolId, ToolParam, ToolStatus, ToolSummary};
use serde::{Deserialize, Serialize};

/// A named, versioned, categorized tool descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Stable identifier.
    pub id: ToolId,
    /// Unique name among active tools.
    pub name: String,
    /// Semver version string.
    pub version: String,
    /// Human-readable description.
    pub description: String,
    /// Closed-set category tag.
    pub category: String,
    /// Declared parameters.
    pub parameters: Vec<ToolParam>,
    /// Free-form return schema.
    pub returns: serde_json::Value,
    /// How the tool is invoked.
    pub entry: ToolEntryKind,
    /// Author attribution.
    pub author: Option<String>,
    /// Free-form classification tags.
    pub tags: Vec<String>,
    /// Current lifecycle status.
    pub status: ToolStatus,
    /// Per-tool concurrency ceiling override, if any.
    pub concurrency: Option<usize>,
    /// Number of times this tool has been successfully invoked.
    pub usage_counter: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Tool {
    /// Build a freshly loaded tool in `draft` status with a zeroed usage counter.
    pub fn from_manifest(id: ToolId, manifest: crate::manifest::ToolManifest) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: manifest.name,
            version: manifest.version,
            description: manifest.description,
            category: manifest.category,
            parameters: manifest.parameters,
            returns: manifest.returns,
            entry: manifest.entry,
            author: None,
            tags: manifest.tags,
            status: ToolStatus::Draft,
            concurrency: manifest.concurrency,
            usage_counter: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// A protocol-level [`ToolSummary`] view, for the validator/repository boundary.
    pub fn to_summary(&self) -> ToolSummary {
        ToolSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status,
            parameters: self.parameters.clone(),
            entry: self.entry.clone(),
        }
    }

    /// Attempt the `testing -> published` transition. The only status
    /// transition the publish action is allowed to perform (§3 "Tool").
    pub fn publish(&mut self) -> Result<(), ToolStatusError> {
        if self.status != ToolStatus::Testing {
            return Err(ToolStatusError { from: self.status, to: ToolStatus::Published });
        }
        self.status = ToolStatus::Published;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the tool deprecated, from any status.
    pub fn deprecate(&mut self) {
        self.status = ToolStatus::Deprecated;
        self.updated_at = Utc::now();
    }

    /// Advance from `draft` to `testing`.
    pub fn begin_testing(&mut self) -> Result<(), ToolStatusError> {
        if self.status != ToolStatus::Draft {
            return Err(ToolStatusError { from: self.status, to: ToolStatus::Testing });
        }
        self.status = ToolStatus::Testing;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Rejected tool-status transition.
#[derive(Debug, thiserror::Error)]
#[error("invalid tool status transition: {from:?} -> {to:?}")]
pub struct ToolStatusError {
    from: ToolStatus,
    to: ToolStatus,
}
