use std::sync::Arc;

use serde::Serialize;

use crate::connection_manager::{ConnectionHandle, ConnectionManager, SendError};
use crate::metrics::OutboundMetrics;
use crate::websocket::{OutboundMessage, ServerMessage};

use super::{ConnectionRegistry, Session};

/// Result of a fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    /// Connections the message was queued to
    pub delivered: usize,
    /// Connections skipped because they were closed or their queue was full
    pub skipped: usize,
}

impl DeliveryResult {
    fn record(&mut self, outcome: Result<(), SendError>) {
        match outcome {
            Ok(()) => self.delivered += 1,
            Err(_) => self.skipped += 1,
        }
    }
}

/// Fan-out over the transport's open connections.
///
/// Sends are fire-and-forget: nothing is awaited and a connection that is not
/// open (or cannot take more) is skipped without retry.
pub struct Broadcaster {
    connections: Arc<ConnectionManager>,
    hide_unlocated: bool,
}

impl Broadcaster {
    pub fn new(connections: Arc<ConnectionManager>, hide_unlocated: bool) -> Self {
        Self {
            connections,
            hide_unlocated,
        }
    }

    /// Serialize once and queue the same text to every open connection
    pub fn broadcast(&self, message: &ServerMessage) -> DeliveryResult {
        let outbound = match OutboundMessage::preserialize(message) {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize broadcast");
                return DeliveryResult::default();
            }
        };

        let mut result = DeliveryResult::default();
        for handle in self.connections.get_open_connections() {
            let outcome = handle.send_outbound(outbound.clone());
            log_skip(&handle, outcome);
            result.record(outcome);
        }

        record_metrics(result);
        result
    }

    /// Queue a message to one connection; a no-op if it is not open
    pub fn send(&self, connection: &ConnectionHandle, message: ServerMessage) -> bool {
        let outcome = connection.send(message);
        log_skip(connection, outcome);

        let mut result = DeliveryResult::default();
        result.record(outcome);
        record_metrics(result);
        outcome.is_ok()
    }

    /// Queue a message to each listed connection, in order, once per distinct
    /// connection
    pub fn send_to(&self, targets: &[&ConnectionHandle], message: &ServerMessage) -> DeliveryResult {
        let outbound = match OutboundMessage::preserialize(message) {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message");
                return DeliveryResult::default();
            }
        };

        let mut result = DeliveryResult::default();
        for (i, handle) in targets.iter().enumerate() {
            if targets[..i].iter().any(|earlier| earlier.id == handle.id) {
                continue;
            }
            let outcome = handle.send_outbound(outbound.clone());
            log_skip(handle, outcome);
            result.record(outcome);
        }

        record_metrics(result);
        result
    }

    /// Sessions as they appear in a `users` snapshot
    pub fn presence_list(&self, registry: &ConnectionRegistry) -> Vec<Session> {
        let sessions = registry.all_sessions();
        if self.hide_unlocated {
            sessions.into_iter().filter(Session::is_located).collect()
        } else {
            sessions
        }
    }

    /// Broadcast the full presence snapshot
    pub fn presence_broadcast(&self, registry: &ConnectionRegistry) -> DeliveryResult {
        let list = self.presence_list(registry);
        tracing::debug!(sessions = list.len(), "Broadcasting presence");
        self.broadcast(&ServerMessage::users(list))
    }
}

fn log_skip(handle: &ConnectionHandle, outcome: Result<(), SendError>) {
    match outcome {
        Ok(()) => {}
        Err(SendError::Closed) => {
            tracing::debug!(connection_id = %handle.id, "Skipping closed connection");
        }
        Err(SendError::Full) => {
            tracing::warn!(connection_id = %handle.id, "Outbound queue full, message dropped");
        }
    }
}

fn record_metrics(result: DeliveryResult) {
    OutboundMetrics::record_sent(result.delivered as u64);
    OutboundMetrics::record_skipped(result.skipped as u64);
}
