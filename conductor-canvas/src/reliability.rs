//! Reliable delivery: pending-ack tracking with retry/backoff (§4.10
//! "Reliable messages").

use crate::message::CanvasMessage;
use conductor_protocol::{DurationMs, WorkflowId};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// Default retry ceiling before a pending message is dropped (§4.10
/// "`retry_count >= max_retries` (default 3)").
pub const DEFAULT_MAX_RETRIES: u32 = 3;

struct Pending {
    workflow_id: WorkflowId,
    message: CanvasMessage,
    sent_at_ms: u64,
    retry_count: u32,
}

/// Tracks unacknowledged reliable messages and decides when to resend or
/// give up on them.
pub struct AckTracker {
    pending: RwLock<HashMap<String, Pending>>,
    ack_timeout: DurationMs,
    max_retries: u32,
}

/// What [`AckTracker::sweep`] decided for one pending message.
pub enum SweepAction {
    /// Resend this message; the caller should re-deliver with the same
    /// `message_id` so receivers dedupe (§5 "the original `message_id` is
    /// reused so receivers dedupe").
    Retry(CanvasMessage),
    /// This message exceeded `max_retries`; it has been dropped.
    GiveUp(CanvasMessage),
}

impl AckTracker {
    /// Build a tracker with the given ack timeout and retry ceiling.
    pub fn new(ack_timeout: DurationMs, max_retries: u32) -> Self {
        Self { pending: RwLock::new(HashMap::new()), ack_timeout, max_retries }
    }

    /// Register a message as awaiting acknowledgement. No-op if the
    /// message carries no `message_id` (not a reliable-delivery variant).
    pub async fn register(&self, workflow_id: WorkflowId, message: CanvasMessage) {
        let Some(message_id) = message.message_id().map(str::to_owned) else { return };
        self.pending.write().await.insert(
            message_id,
            Pending { workflow_id, message, sent_at_ms: now_ms(), retry_count: 0 },
        );
    }

    /// Acknowledge a message, removing it from tracking. Returns whether
    /// it was actually pending.
    pub async fn acknowledge(&self, message_id: &str) -> bool {
        self.pending.write().await.remove(message_id).is_some()
    }

    /// Pending messages for one workflow, for diagnostics.
    pub async fn pending_for(&self, workflow_id: &WorkflowId) -> Vec<CanvasMessage> {
        self.pending
            .read()
            .await
            .values()
            .filter(|p| &p.workflow_id == workflow_id)
            .map(|p| p.message.clone())
            .collect()
    }

    /// Scan for entries whose backoff window elapsed. An entry is due
    /// for retry once `now - sent_at > ack_timeout * (retry_count + 1)`.
    /// Entries that have hit `max_retries` are dropped instead and
    /// reported as [`SweepAction::GiveUp`].
    pub async fn sweep(&self) -> Vec<SweepAction> {
        let now = now_ms();
        let mut actions = Vec::new();
        let mut pending = self.pending.write().await;
        let mut give_up = Vec::new();

        for (message_id, entry) in pending.iter_mut() {
            let elapsed = now.saturating_sub(entry.sent_at_ms);
            let window = self.ack_timeout.as_millis() * u64::from(entry.retry_count + 1);
            if elapsed <= window {
                continue;
            }
            if entry.retry_count >= self.max_retries {
                give_up.push(message_id.clone());
            } else {
                entry.retry_count += 1;
                entry.sent_at_ms = now;
                actions.push(SweepAction::Retry(entry.message.clone()));
            }
        }

        for message_id in give_up {
            if let Some(entry) = pending.remove(&message_id) {
                actions.push(SweepAction::GiveUp(entry.message));
            }
        }

        actions
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str) -> CanvasMessage {
        CanvasMessage::NodeDeleted {
            workflow_id: WorkflowId::from("w1"),
            timestamp: 0,
            message_id: id.to_string(),
            node_id: conductor_protocol::NodeId::from("n1"),
        }
    }

    #[tokio::test]
    async fn acknowledge_removes_a_pending_entry() {
        let tracker = AckTracker::new(DurationMs::from_millis(1000), DEFAULT_MAX_RETRIES);
        tracker.register(WorkflowId::from("w1"), msg("m1")).await;
        assert!(tracker.acknowledge("m1").await);
        assert!(!tracker.acknowledge("m1").await);
    }

    #[tokio::test]
    async fn sweep_is_a_no_op_before_the_backoff_window_elapses() {
        let tracker = AckTracker::new(DurationMs::from_secs(60), DEFAULT_MAX_RETRIES);
        tracker.register(WorkflowId::from("w1"), msg("m1")).await;
        let actions = tracker.sweep().await;
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn sweep_retries_an_overdue_entry() {
        let tracker = AckTracker::new(DurationMs::from_millis(0), DEFAULT_MAX_RETRIES);
        tracker.register(WorkflowId::from("w1"), msg("m1")).await;
        let actions = tracker.sweep().await;
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], SweepAction::Retry(_)));
    }

    #[tokio::test]
    async fn sweep_gives_up_past_max_retries() {
        let tracker = AckTracker::new(DurationMs::from_millis(0), 0);
        tracker.register(WorkflowId::from("w1"), msg("m1")).await;
        let actions = tracker.sweep().await;
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], SweepAction::GiveUp(_)));
        assert!(tracker.pending_for(&WorkflowId::from("w1")).await.is_empty());
    }
}
