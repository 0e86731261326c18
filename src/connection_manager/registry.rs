use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::websocket::OutboundMessage;

use super::{ConnectionHandle, ConnectionStats};

/// Tracks every live WebSocket connection, logged in or not
pub struct ConnectionManager {
    /// connection_id -> ConnectionHandle
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a new connection
    pub fn register(&self, sender: mpsc::Sender<OutboundMessage>) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(sender));
        self.connections.insert(handle.id, handle.clone());

        tracing::debug!(connection_id = %handle.id, "Connection registered");

        handle
    }

    /// Unregister a connection. Returns false if it was not registered.
    pub fn unregister(&self, connection_id: Uuid) -> bool {
        match self.connections.remove(&connection_id) {
            Some((_, handle)) => {
                handle.close();
                tracing::debug!(connection_id = %connection_id, "Connection unregistered");
                true
            }
            None => false,
        }
    }

    /// Get all connections
    pub fn get_all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    /// Connections still accepting outbound messages
    pub fn get_open_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections
            .iter()
            .filter(|r| r.value().is_open())
            .map(|r| r.value().clone())
            .collect()
    }

    pub fn stats(&self) -> ConnectionStats {
        let open_connections = self
            .connections
            .iter()
            .filter(|r| r.value().is_open())
            .count();

        ConnectionStats {
            total_connections: self.connections.len(),
            open_connections,
        }
    }

    /// Find connections that have been inactive for longer than the timeout
    pub fn find_stale_connections(&self, timeout_secs: u64) -> Vec<Arc<ConnectionHandle>> {
        let now = Utc::now();
        let timeout = chrono::Duration::seconds(timeout_secs as i64);

        self.connections
            .iter()
            .filter(|entry| now.signed_duration_since(entry.value().last_activity()) > timeout)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Close stale connections and return how many were closed.
    ///
    /// Closing wakes each connection's task, which runs the normal disconnect
    /// path (transport unregister plus session cleanup).
    pub fn close_stale_connections(&self, timeout_secs: u64) -> usize {
        let stale = self.find_stale_connections(timeout_secs);
        let count = stale.len();

        for handle in stale {
            tracing::info!(connection_id = %handle.id, "Closing stale connection due to timeout");
            handle.close();
        }

        count
    }

    /// Close every connection (shutdown)
    pub fn close_all(&self) -> usize {
        let connections = self.get_all_connections();
        for handle in &connections {
            handle.close();
        }
        connections.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
