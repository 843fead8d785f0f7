//! The per-workflow connection set (§4.10 "Connections", "Broadcast").

use crate::message::CanvasMessage;
use conductor_protocol::{CanvasError, CanvasTransport, ConnectionId, WorkflowId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Connections grouped by workflow id, with fan-out broadcast that
/// self-heals by dropping connections whose `send` fails (§4.10).
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<WorkflowId, Vec<Arc<dyn CanvasTransport>>>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    /// Build an empty registry.
    pub fn new() -> Self {
        Self { connections: RwLock::new(HashMap::new()) }
    }

    /// Register a new connection under a workflow.
    pub async fn connect(&self, workflow_id: WorkflowId, connection: Arc<dyn CanvasTransport>) {
        self.connections.write().await.entry(workflow_id).or_default().push(connection);
    }

    /// Remove a connection from a workflow's set.
    pub async fn disconnect(&self, workflow_id: &WorkflowId, connection_id: &ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(set) = connections.get_mut(workflow_id) {
            set.retain(|c| c.connection_id() != connection_id);
            if set.is_empty() {
                connections.remove(workflow_id);
            }
        }
    }

    /// Every connection id currently registered for a workflow.
    pub async fn client_ids(&self, workflow_id: &WorkflowId) -> Vec<ConnectionId> {
        self.connections
            .read()
            .await
            .get(workflow_id)
            .map(|set| set.iter().map(|c| c.connection_id().clone()).collect())
            .unwrap_or_default()
    }

    /// Fan a message out to every connection on a workflow, excluding one
    /// connection id if given. Any connection whose `send` fails is
    /// dropped from the set (§4.10).
    pub async fn broadcast(
        &self,
        workflow_id: &WorkflowId,
        message: &CanvasMessage,
        exclude: Option<&ConnectionId>,
    ) -> Result<(), CanvasError> {
        let targets = {
            let connections = self.connections.read().await;
            match connections.get(workflow_id) {
                Some(set) => set.clone(),
                None => return Err(CanvasError::NoConnections(workflow_id.to_string())),
            }
        };

        let payload = serde_json::to_value(message).unwrap_or_default();
        let mut dead = Vec::new();
        for connection in &targets {
            if exclude.is_some_and(|id| id == connection.connection_id()) {
                continue;
            }
            if let Err(err) = connection.send(&payload).await {
                warn!(connection_id = %connection.connection_id(), error = %err, "canvas send failed");
                dead.push(connection.connection_id().clone());
            }
        }

        if !dead.is_empty() {
            let mut connections = self.connections.write().await;
            if let Some(set) = connections.get_mut(workflow_id) {
                set.retain(|c| !dead.contains(c.connection_id()));
                if set.is_empty() {
                    connections.remove(workflow_id);
                }
            }
        }

        Ok(())
    }

    /// Send a message to one specific connection within a workflow. On
    /// failure the connection is dropped from the set.
    pub async fn send_to(
        &self,
        workflow_id: &WorkflowId,
        connection_id: &ConnectionId,
        message: &CanvasMessage,
    ) -> Result<(), CanvasError> {
        let target = {
            let connections = self.connections.read().await;
            connections
                .get(workflow_id)
                .and_then(|set| set.iter().find(|c| c.connection_id() == connection_id).cloned())
        };
        let Some(connection) = target else {
            return Err(CanvasError::ConnectionClosed(connection_id.to_string()));
        };

        let payload = serde_json::to_value(message).unwrap_or_default();
        if let Err(err) = connection.send(&payload).await {
            self.disconnect(workflow_id, connection_id).await;
            return Err(err);
        }
        Ok(())
    }

    /// Connection counts per workflow, for diagnostics.
    pub async fn statistics(&self) -> HashMap<WorkflowId, usize> {
        self.connections.read().await.iter().map(|(id, set)| (id.clone(), set.len())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingTransport {
        id: ConnectionId,
        sent: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CanvasTransport for RecordingTransport {
        fn connection_id(&self) -> &ConnectionId {
            &self.id
        }

        async fn send(&self, _message: &serde_json::Value) -> Result<(), CanvasError> {
            if self.fail {
                return Err(CanvasError::ConnectionClosed(self.id.to_string()));
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn ack_msg(id: &str) -> CanvasMessage {
        CanvasMessage::Ack { message_id: id.to_string() }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let registry = ConnectionRegistry::new();
        let workflow = WorkflowId::from("w1");
        let a = Arc::new(RecordingTransport { id: ConnectionId::from("a"), sent: AtomicUsize::new(0), fail: false });
        let b = Arc::new(RecordingTransport { id: ConnectionId::from("b"), sent: AtomicUsize::new(0), fail: false });
        registry.connect(workflow.clone(), a.clone()).await;
        registry.connect(workflow.clone(), b.clone()).await;

        registry.broadcast(&workflow, &ack_msg("m1"), None).await.unwrap();
        assert_eq!(a.sent.load(Ordering::SeqCst), 1);
        assert_eq!(b.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_failing_connection_is_dropped_from_the_set() {
        let registry = ConnectionRegistry::new();
        let workflow = WorkflowId::from("w1");
        let dead = Arc::new(RecordingTransport { id: ConnectionId::from("dead"), sent: AtomicUsize::new(0), fail: true });
        registry.connect(workflow.clone(), dead).await;

        registry.broadcast(&workflow, &ack_msg("m1"), None).await.unwrap();
        assert!(registry.client_ids(&workflow).await.is_empty());
    }

    #[tokio::test]
    async fn excluded_connection_is_skipped() {
        let registry = ConnectionRegistry::new();
        let workflow = WorkflowId::from("w1");
        let a = Arc::new(RecordingTransport { id: ConnectionId::from("a"), sent: AtomicUsize::new(0), fail: false });
        registry.connect(workflow.clone(), a.clone()).await;

        registry.broadcast(&workflow, &ack_msg("m1"), Some(&ConnectionId::from("a"))).await.unwrap();
        assert_eq!(a.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn broadcast_to_an_unregistered_workflow_errors() {
        let registry = ConnectionRegistry::new();
        let err = registry.broadcast(&WorkflowId::from("ghost"), &ack_msg("m1"), None).await.unwrap_err();
        assert!(matches!(err, CanvasError::NoConnections(_)));
    }
}
