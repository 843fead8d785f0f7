//! The canvas synchronization fabric: the high-level API gluing the
//! connection registry, reliable delivery, inbound dedup, and diffing
//! together (§4.10).

use crate::dedup::InboundDedup;
use crate::message::{diff_to_messages, CanvasMessage};
use crate::registry::ConnectionRegistry;
use crate::reliability::{AckTracker, SweepAction};
use crate::snapshot::{self, CanvasSnapshot};
use conductor_protocol::{CanvasError, CanvasTransport, ConnectionId, DurationMs, WorkflowId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ties the per-workflow connection registry, reliable-delivery tracker,
/// inbound dedup ring, and snapshot diffing into one API surface.
pub struct CanvasFabric {
    registry: ConnectionRegistry,
    snapshots: RwLock<HashMap<WorkflowId, CanvasSnapshot>>,
    acks: AckTracker,
    dedup: InboundDedup,
    message_seq: AtomicU64,
}

impl CanvasFabric {
    /// Build a fabric with the given ack timeout, retry ceiling, and
    /// inbound dedup ring capacity.
    pub fn new(ack_timeout: DurationMs, max_retries: u32, dedup_capacity: usize) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            snapshots: RwLock::new(HashMap::new()),
            acks: AckTracker::new(ack_timeout, max_retries),
            dedup: InboundDedup::new(dedup_capacity),
            message_seq: AtomicU64::new(0),
        }
    }

    fn next_message_id(&self) -> String {
        let n = self.message_seq.fetch_add(1, Ordering::Relaxed);
        format!("msg-{n:016x}")
    }

    /// Register a connection under a workflow. When `send_initial_state`
    /// is set, immediately sends the current snapshot to that connection
    /// alone (§4.10 "On subscribe... send a full `initial_state`").
    pub async fn subscribe(
        &self,
        workflow_id: WorkflowId,
        connection: Arc<dyn CanvasTransport>,
        send_initial_state: bool,
        timestamp: u64,
    ) -> Result<(), CanvasError> {
        let connection_id = connection.connection_id().clone();
        self.registry.connect(workflow_id.clone(), connection).await;

        if send_initial_state {
            let snapshot = self.snapshots.read().await.get(&workflow_id).cloned().unwrap_or_default();
            let message = CanvasMessage::InitialState {
                workflow_id: workflow_id.clone(),
                timestamp,
                nodes: snapshot.nodes,
                edges: snapshot.edges,
            };
            self.registry.send_to(&workflow_id, &connection_id, &message).await?;
        }
        Ok(())
    }

    /// Remove a connection from a workflow's set.
    pub async fn unsubscribe(&self, workflow_id: &WorkflowId, connection_id: &ConnectionId) {
        self.registry.disconnect(workflow_id, connection_id).await;
    }

    /// Replace a workflow's tracked snapshot, broadcast the resulting
    /// diff as a sequence of typed messages, and register each as
    /// pending acknowledgement. A workflow with no connections is not an
    /// error — the new snapshot is simply recorded.
    pub async fn apply_snapshot(
        &self,
        workflow_id: WorkflowId,
        new_snapshot: CanvasSnapshot,
        timestamp: u64,
    ) -> Result<Vec<CanvasMessage>, CanvasError> {
        let old_snapshot = {
            let mut snapshots = self.snapshots.write().await;
            snapshots.insert(workflow_id.clone(), new_snapshot.clone()).unwrap_or_default()
        };

        let diff = snapshot::diff(&old_snapshot, &new_snapshot);
        let messages = diff_to_messages(&workflow_id, &diff, timestamp, || self.next_message_id());

        for message in &messages {
            self.acks.register(workflow_id.clone(), message.clone()).await;
            match self.registry.broadcast(&workflow_id, message, None).await {
                Ok(()) | Err(CanvasError::NoConnections(_)) => {}
                Err(err) => return Err(err),
            }
        }

        Ok(messages)
    }

    /// Broadcast an arbitrary (typically non-state-change) message,
    /// e.g. `execution_status` or a C7 attempt event. Tolerates an empty
    /// connection set.
    pub async fn broadcast(&self, workflow_id: &WorkflowId, message: &CanvasMessage) -> Result<(), CanvasError> {
        match self.registry.broadcast(workflow_id, message, None).await {
            Ok(()) | Err(CanvasError::NoConnections(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Acknowledge a reliable message by id.
    pub async fn acknowledge(&self, message_id: &str) -> bool {
        self.acks.acknowledge(message_id).await
    }

    /// Check an inbound message id against the dedup ring. Returns
    /// `true` if it is new and should be processed, `false` if it is a
    /// repeat and should be dropped (§4.10 "Deduplication (inbound)").
    pub async fn check_inbound(&self, message_id: &str) -> bool {
        self.dedup.check_and_record(message_id).await
    }

    /// Run one retry sweep. Overdue messages are re-broadcast to their
    /// workflow's connections (reusing the original `message_id`);
    /// messages past `max_retries` are handed to `on_failure`.
    pub async fn sweep(&self, on_failure: impl Fn(CanvasMessage)) -> Result<(), CanvasError> {
        for action in self.acks.sweep().await {
            match action {
                SweepAction::Retry(message) => {
                    if let Some(workflow_id) = workflow_id_of(&message) {
                        match self.registry.broadcast(&workflow_id, &message, None).await {
                            Ok(()) | Err(CanvasError::NoConnections(_)) => {}
                            Err(err) => return Err(err),
                        }
                    }
                }
                SweepAction::GiveUp(message) => on_failure(message),
            }
        }
        Ok(())
    }
}

fn workflow_id_of(message: &CanvasMessage) -> Option<WorkflowId> {
    match message {
        CanvasMessage::NodeCreated { workflow_id, .. }
        | CanvasMessage::NodeUpdated { workflow_id, .. }
        | CanvasMessage::NodeDeleted { workflow_id, .. }
        | CanvasMessage::NodeMoved { workflow_id, .. }
        | CanvasMessage::EdgeCreated { workflow_id, .. }
        | CanvasMessage::EdgeDeleted { workflow_id, .. } => Some(workflow_id.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{NodeSnapshot, Position};
    use async_trait::async_trait;
    use conductor_protocol::NodeId;
    use std::sync::Mutex;

    struct CapturingTransport {
        id: ConnectionId,
        received: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl CanvasTransport for CapturingTransport {
        fn connection_id(&self) -> &ConnectionId {
            &self.id
        }

        async fn send(&self, message: &serde_json::Value) -> Result<(), CanvasError> {
            self.received.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn fabric() -> CanvasFabric {
        CanvasFabric::new(DurationMs::from_secs(5), 3, 1000)
    }

    #[tokio::test]
    async fn subscribing_with_initial_state_sends_a_snapshot() {
        let fabric = fabric();
        let workflow = WorkflowId::from("w1");
        let transport = Arc::new(CapturingTransport { id: ConnectionId::from("c1"), received: Mutex::new(vec![]) });
        fabric.subscribe(workflow, transport.clone(), true, 0).await.unwrap();

        let received = transport.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["type"], "initial_state");
    }

    #[tokio::test]
    async fn applying_a_snapshot_broadcasts_the_diff_to_subscribers() {
        let fabric = fabric();
        let workflow = WorkflowId::from("w1");
        let transport = Arc::new(CapturingTransport { id: ConnectionId::from("c1"), received: Mutex::new(vec![]) });
        fabric.subscribe(workflow.clone(), transport.clone(), false, 0).await.unwrap();

        let snapshot = CanvasSnapshot {
            nodes: vec![NodeSnapshot {
                id: NodeId::from("n1"),
                node_type: "default".into(),
                position: Position::default(),
                data: serde_json::json!({}),
            }],
            edges: vec![],
        };
        let messages = fabric.apply_snapshot(workflow, snapshot, 1).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(transport.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_inbound_ids_are_rejected_on_second_sight() {
        let fabric = fabric();
        assert!(fabric.check_inbound("m1").await);
        assert!(!fabric.check_inbound("m1").await);
    }

    #[tokio::test]
    async fn sweep_retries_unacked_messages_with_the_same_id() {
        let fabric = CanvasFabric::new(DurationMs::from_millis(0), 3, 1000);
        let workflow = WorkflowId::from("w1");
        let transport = Arc::new(CapturingTransport { id: ConnectionId::from("c1"), received: Mutex::new(vec![]) });
        fabric.subscribe(workflow.clone(), transport.clone(), false, 0).await.unwrap();

        let snapshot = CanvasSnapshot {
            nodes: vec![NodeSnapshot {
                id: NodeId::from("n1"),
                node_type: "default".into(),
                position: Position::default(),
                data: serde_json::json!({}),
            }],
            edges: vec![],
        };
        fabric.apply_snapshot(workflow, snapshot, 1).await.unwrap();
        transport.received.lock().unwrap().clear();

        fabric.sweep(|_| panic!("should not give up yet")).await.unwrap();
        assert_eq!(transport.received.lock().unwrap().len(), 1, "message should have been resent");
    }
}
