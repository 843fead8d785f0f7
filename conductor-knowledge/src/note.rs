//! The knowledge-note lifecycle manager (§3 "Knowledge note", §4.8).
//!
//! Independent of the tool-call audit log: its own types, its own state
//! machine, its own audit trail of transitions.

use crate::error::KnowledgeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// What kind of collaboration artifact a note captures.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// An in-progress status update.
    Progress,
    /// A final conclusion reached.
    Conclusion,
    /// Something blocking forward progress.
    Blocker,
    /// A concrete follow-up action.
    NextAction,
    /// Supporting reference material.
    Reference,
}

/// The note's lifecycle status. Transitions are the only valid way to
/// mutate this field (§3).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    /// Freely editable by its owner.
    Draft,
    /// Submitted for review; content frozen until a decision is made.
    Pending,
    /// Reviewed and accepted; content is now immutable.
    Approved,
    /// Retired. Still queryable for audit (§9 open question, resolved yes).
    Archived,
}

impl NoteStatus {
    fn can_transition_to(self, next: NoteStatus) -> bool {
        use NoteStatus::*;
        matches!(
            (self, next),
            (Draft, Pending) | (Pending, Approved) | (Pending, Draft) | (Draft, Archived) | (Pending, Archived) | (Approved, Archived)
        )
    }
}

/// A knowledge note (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNote {
    /// Stable identifier, shared across forked versions.
    pub id: String,
    /// Monotonic version number; forking increments it.
    pub version: u32,
    /// The prior version's record id, if this note was forked.
    pub forked_from: Option<String>,
    /// What kind of artifact this is.
    pub kind: NoteKind,
    /// Current lifecycle status.
    pub status: NoteStatus,
    /// Identifier of the note's owner/author.
    pub owner: String,
    /// Free-form body.
    pub content: String,
    /// Freeform classification tags.
    pub tags: Vec<String>,
    /// Who approved the note, once approved.
    pub approved_by: Option<String>,
    /// When the note was approved.
    pub approved_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}

/// One transition in a note's independent audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteAuditEvent {
    /// The note's record id this event applies to.
    pub note_record_id: String,
    /// The status before the transition.
    pub from: NoteStatus,
    /// The status after the transition.
    pub to: NoteStatus,
    /// Who performed the transition.
    pub actor: String,
    /// Optional reviewer comment (e.g. rejection reason).
    pub reason: Option<String>,
    /// When it happened.
    pub at: DateTime<Utc>,
}

/// Boundary the rest of the runtime manages notes through.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Create a new draft note.
    async fn create(&self, kind: NoteKind, owner: &str, content: String, tags: Vec<String>) -> KnowledgeNote;

    /// Fetch a note by record id (the specific version, not the logical id).
    async fn get(&self, record_id: &str) -> Result<KnowledgeNote, KnowledgeError>;

    /// Replace a draft or pending note's content in place. Rejected once
    /// the note is approved or archived — fork instead.
    async fn edit_content(&self, record_id: &str, content: String) -> Result<KnowledgeNote, KnowledgeError>;

    /// Submit a draft for review.
    async fn submit(&self, record_id: &str, actor: &str) -> Result<KnowledgeNote, KnowledgeError>;

    /// Approve a pending note, freezing its content.
    async fn approve(&self, record_id: &str, actor: &str) -> Result<KnowledgeNote, KnowledgeError>;

    /// Reject a pending note back to draft.
    async fn reject(&self, record_id: &str, actor: &str, reason: Option<String>) -> Result<KnowledgeNote, KnowledgeError>;

    /// Archive a note from any non-archived status.
    async fn archive(&self, record_id: &str, actor: &str) -> Result<KnowledgeNote, KnowledgeError>;

    /// Fork a new editable draft from an approved or archived note,
    /// carrying its logical id forward with an incremented version.
    async fn fork(&self, record_id: &str, owner: &str) -> Result<KnowledgeNote, KnowledgeError>;

    /// The transition history for one note record, oldest first.
    async fn audit_log(&self, record_id: &str) -> Vec<NoteAuditEvent>;
}

/// An in-memory [`NoteStore`], keyed by record id (one entry per version).
#[derive(Default)]
pub struct InMemoryNoteStore {
    notes: RwLock<HashMap<String, KnowledgeNote>>,
    events: RwLock<Vec<NoteAuditEvent>>,
}

impl InMemoryNoteStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn transition(
        &self,
        record_id: &str,
        to: NoteStatus,
        actor: &str,
        reason: Option<String>,
    ) -> Result<KnowledgeNote, KnowledgeError> {
        let mut notes = self.notes.write().await;
        let note = notes.get_mut(record_id).ok_or_else(|| KnowledgeError::NotFound(record_id.to_string()))?;
        if !note.status.can_transition_to(to) {
            return Err(KnowledgeError::InvalidTransition {
                from: format!("{:?}", note.status),
                to: format!("{:?}", to),
            });
        }
        let from = note.status;
        note.status = to;
        note.updated_at = Utc::now();
        if to == NoteStatus::Approved {
            note.approved_by = Some(actor.to_string());
            note.approved_at = Some(note.updated_at);
        }
        let snapshot = note.clone();
        drop(notes);

        info!(note_id = %snapshot.id, record_id, ?from, ?to, "knowledge note transitioned");
        self.events.write().await.push(NoteAuditEvent {
            note_record_id: record_id.to_string(),
            from,
            to,
            actor: actor.to_string(),
            reason,
            at: snapshot.updated_at,
        });
        Ok(snapshot)
    }
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn create(&self, kind: NoteKind, owner: &str, content: String, tags: Vec<String>) -> KnowledgeNote {
        let now = Utc::now();
        let record_id = Uuid::new_v4().to_string();
        let note = KnowledgeNote {
            id: record_id.clone(),
            version: 1,
            forked_from: None,
            kind,
            status: NoteStatus::Draft,
            owner: owner.to_string(),
            content,
            tags,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        self.notes.write().await.insert(record_id, note.clone());
        note
    }

    async fn get(&self, record_id: &str) -> Result<KnowledgeNote, KnowledgeError> {
        self.notes
            .read()
            .await
            .get(record_id)
            .cloned()
            .ok_or_else(|| KnowledgeError::NotFound(record_id.to_string()))
    }

    async fn edit_content(&self, record_id: &str, content: String) -> Result<KnowledgeNote, KnowledgeError> {
        let mut notes = self.notes.write().await;
        let note = notes.get_mut(record_id).ok_or_else(|| KnowledgeError::NotFound(record_id.to_string()))?;
        if matches!(note.status, NoteStatus::Approved | NoteStatus::Archived) {
            return Err(KnowledgeError::Immutable(record_id.to_string()));
        }
        note.content = content;
        note.updated_at = Utc::now();
        Ok(note.clone())
    }

    async fn submit(&self, record_id: &str, actor: &str) -> Result<KnowledgeNote, KnowledgeError> {
        self.transition(record_id, NoteStatus::Pending, actor, None).await
    }

    async fn approve(&self, record_id: &str, actor: &str) -> Result<KnowledgeNote, KnowledgeError> {
        self.transition(record_id, NoteStatus::Approved, actor, None).await
    }

    async fn reject(&self, record_id: &str, actor: &str, reason: Option<String>) -> Result<KnowledgeNote, KnowledgeError> {
        self.transition(record_id, NoteStatus::Draft, actor, reason).await
    }

    async fn archive(&self, record_id: &str, actor: &str) -> Result<KnowledgeNote, KnowledgeError> {
        self.transition(record_id, NoteStatus::Archived, actor, None).await
    }

    async fn fork(&self, record_id: &str, owner: &str) -> Result<KnowledgeNote, KnowledgeError> {
        let source = self.get(record_id).await?;
        let now = Utc::now();
        let new_record_id = Uuid::new_v4().to_string();
        let forked = KnowledgeNote {
            id: new_record_id.clone(),
            version: source.version + 1,
            forked_from: Some(record_id.to_string()),
            kind: source.kind,
            status: NoteStatus::Draft,
            owner: owner.to_string(),
            content: source.content,
            tags: source.tags,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        self.notes.write().await.insert(new_record_id, forked.clone());
        Ok(forked)
    }

    async fn audit_log(&self, record_id: &str) -> Vec<NoteAuditEvent> {
        self.events.read().await.iter().filter(|e| e.note_record_id == record_id).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn draft_lifecycle_reaches_approved() {
        let store = InMemoryNoteStore::new();
        let note = store.create(NoteKind::Progress, "alice", "started work".into(), vec![]).await;

        store.submit(&note.id, "alice").await.unwrap();
        let approved = store.approve(&note.id, "bob").await.unwrap();
        assert_eq!(approved.status, NoteStatus::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("bob"));

        let log = store.audit_log(&note.id).await;
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn approved_content_is_immutable() {
        let store = InMemoryNoteStore::new();
        let note = store.create(NoteKind::Conclusion, "alice", "v1".into(), vec![]).await;
        store.submit(&note.id, "alice").await.unwrap();
        store.approve(&note.id, "bob").await.unwrap();

        let err = store.edit_content(&note.id, "v2".into()).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::Immutable(_)));
    }

    #[tokio::test]
    async fn fork_creates_new_editable_version() {
        let store = InMemoryNoteStore::new();
        let note = store.create(NoteKind::Reference, "alice", "v1".into(), vec!["api".into()]).await;
        store.submit(&note.id, "alice").await.unwrap();
        store.approve(&note.id, "bob").await.unwrap();

        let forked = store.fork(&note.id, "alice").await.unwrap();
        assert_eq!(forked.version, 2);
        assert_eq!(forked.status, NoteStatus::Draft);
        assert_eq!(forked.forked_from.as_deref(), Some(note.id.as_str()));

        store.edit_content(&forked.id, "v2".into()).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_note_returns_to_draft_and_is_editable() {
        let store = InMemoryNoteStore::new();
        let note = store.create(NoteKind::Blocker, "alice", "stuck".into(), vec![]).await;
        store.submit(&note.id, "alice").await.unwrap();
        let rejected = store.reject(&note.id, "bob", Some("needs detail".into())).await.unwrap();
        assert_eq!(rejected.status, NoteStatus::Draft);

        store.edit_content(&note.id, "stuck, more detail".into()).await.unwrap();
    }

    #[tokio::test]
    async fn archived_note_remains_queryable() {
        let store = InMemoryNoteStore::new();
        let note = store.create(NoteKind::NextAction, "alice", "follow up".into(), vec![]).await;
        store.archive(&note.id, "alice").await.unwrap();

        let fetched = store.get(&note.id).await.unwrap();
        assert_eq!(fetched.status, NoteStatus::Archived);
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected() {
        let store = InMemoryNoteStore::new();
        let note = store.create(NoteKind::Progress, "alice", "x".into(), vec![]).await;
        let err = store.approve(&note.id, "bob").await.unwrap_err();
        assert!(matches!(err, KnowledgeError::InvalidTransition { .. }));
    }
}
