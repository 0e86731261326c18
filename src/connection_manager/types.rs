//! Connection handle and related types

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::websocket::{OutboundMessage, ServerMessage};

/// Handle for a single WebSocket connection.
///
/// Carries no identity of its own; a login processed against it is what binds
/// a username to it.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: Uuid,
    sender: mpsc::Sender<OutboundMessage>,
    pub connected_at: DateTime<Utc>,
    /// Last activity timestamp (Unix seconds) - using AtomicI64 for lock-free updates
    last_activity: AtomicI64,
    open: AtomicBool,
    close_signal: Notify,
}

/// Why a send did not reach the connection's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Connection was closed locally or its writer has gone away
    Closed,
    /// Outbound queue is at capacity
    Full,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "connection closed"),
            Self::Full => write!(f, "outbound queue full"),
        }
    }
}

impl std::error::Error for SendError {}

impl ConnectionHandle {
    pub fn new(sender: mpsc::Sender<OutboundMessage>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sender,
            connected_at: now,
            last_activity: AtomicI64::new(now.timestamp()),
            open: AtomicBool::new(true),
            close_signal: Notify::new(),
        }
    }

    pub fn update_activity(&self) {
        self.last_activity
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.last_activity.load(Ordering::Relaxed), 0)
            .unwrap_or_else(Utc::now)
    }

    /// Open and still accepting outbound messages
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.sender.is_closed()
    }

    /// Queue a ServerMessage (serialized by the writer task).
    ///
    /// Never waits: a full queue drops the message for this connection.
    pub fn send(&self, message: ServerMessage) -> Result<(), SendError> {
        self.send_outbound(OutboundMessage::Raw(message))
    }

    /// Queue a pre-serialized or control message
    pub fn send_outbound(&self, message: OutboundMessage) -> Result<(), SendError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(SendError::Closed);
        }

        self.sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Stop accepting messages and wake the connection task so it can send a
    /// close frame and tear down. Idempotent.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            tracing::debug!(connection_id = %self.id, "Closing connection");
            self.close_signal.notify_one();
        }
    }

    /// Resolves once [`close`](Self::close) has been called
    pub async fn closed(&self) {
        if !self.open.load(Ordering::Acquire) {
            return;
        }
        self.close_signal.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_after_close_is_rejected() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = ConnectionHandle::new(tx);

        assert!(handle.is_open());
        handle.send(ServerMessage::users(vec![])).unwrap();
        assert!(rx.recv().await.is_some());

        handle.close();
        assert!(!handle.is_open());
        assert_eq!(handle.send(ServerMessage::users(vec![])), Err(SendError::Closed));
        // closed() resolves immediately once the handle is closed
        handle.closed().await;
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_waiting() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new(tx);

        handle.send_outbound(OutboundMessage::Ping).unwrap();
        assert_eq!(handle.send_outbound(OutboundMessage::Ping), Err(SendError::Full));
    }

    #[tokio::test]
    async fn test_dropped_receiver_reads_as_closed() {
        let (tx, rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new(tx);
        drop(rx);

        assert!(!handle.is_open());
        assert_eq!(handle.send_outbound(OutboundMessage::Ping), Err(SendError::Closed));
    }

    #[tokio::test]
    async fn test_close_wakes_waiter() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = std::sync::Arc::new(ConnectionHandle::new(tx));

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.closed().await })
        };
        tokio::task::yield_now().await;
        handle.close();

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("closed() did not resolve")
            .unwrap();
    }
}
