use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::WebSocketConfig;
use crate::connection_manager::{ConnectionManager, SendError};
use crate::websocket::OutboundMessage;

/// Outcome of one heartbeat round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatRound {
    pub sent: usize,
    pub full: usize,
}

/// Background task for heartbeat and stale connection cleanup
pub struct HeartbeatTask {
    config: WebSocketConfig,
    connection_manager: Arc<ConnectionManager>,
    shutdown: broadcast::Receiver<()>,
}

impl HeartbeatTask {
    pub fn new(
        config: WebSocketConfig,
        connection_manager: Arc<ConnectionManager>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            connection_manager,
            shutdown,
        }
    }

    /// Run the heartbeat and cleanup tasks
    pub async fn run(mut self) {
        let heartbeat_interval = Duration::from_secs(self.config.heartbeat_interval);
        let cleanup_interval = Duration::from_secs(self.config.cleanup_interval);
        let connection_timeout = self.config.connection_timeout;

        let mut heartbeat_timer = tokio::time::interval(heartbeat_interval);
        let mut cleanup_timer = tokio::time::interval(cleanup_interval);

        // Skip immediate first tick
        heartbeat_timer.tick().await;
        cleanup_timer.tick().await;

        tracing::info!(
            heartbeat_interval_secs = self.config.heartbeat_interval,
            cleanup_interval_secs = self.config.cleanup_interval,
            connection_timeout_secs = connection_timeout,
            "Heartbeat task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Heartbeat task received shutdown signal");
                    break;
                }
                _ = heartbeat_timer.tick() => {
                    self.send_heartbeats();
                }
                _ = cleanup_timer.tick() => {
                    self.cleanup_stale_connections(connection_timeout);
                }
            }
        }

        tracing::info!("Heartbeat task stopped");
    }

    /// Queue a ping to every open connection. Never waits on a slow client.
    pub fn send_heartbeats(&self) -> HeartbeatRound {
        let mut round = HeartbeatRound::default();

        for handle in self.connection_manager.get_open_connections() {
            match handle.send_outbound(OutboundMessage::Ping) {
                Ok(()) => round.sent += 1,
                Err(SendError::Full) => {
                    round.full += 1;
                    tracing::debug!(
                        connection_id = %handle.id,
                        "Outbound queue full, skipping heartbeat"
                    );
                }
                Err(SendError::Closed) => {}
            }
        }

        if round.sent > 0 || round.full > 0 {
            tracing::debug!(sent = round.sent, full = round.full, "Heartbeat round complete");
        }

        round
    }

    /// Close connections with no inbound activity within the timeout
    pub fn cleanup_stale_connections(&self, connection_timeout: u64) -> usize {
        let closed = self
            .connection_manager
            .close_stale_connections(connection_timeout);

        if closed > 0 {
            tracing::info!(count = closed, "Closed stale connections");
        }

        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn task(manager: Arc<ConnectionManager>) -> HeartbeatTask {
        let (_tx, rx) = broadcast::channel(1);
        HeartbeatTask::new(WebSocketConfig::default(), manager, rx)
    }

    #[test]
    fn test_heartbeat_pings_open_connections() {
        let manager = Arc::new(ConnectionManager::new());
        let (tx1, mut rx1) = mpsc::channel(1);
        let (tx2, _rx2) = mpsc::channel(1);
        manager.register(tx1);
        let closed = manager.register(tx2);
        closed.close();

        let heartbeat = task(manager);
        assert_eq!(heartbeat.send_heartbeats(), HeartbeatRound { sent: 1, full: 0 });
        assert!(matches!(rx1.try_recv(), Ok(OutboundMessage::Ping)));

        // Fill the single-slot queue; the next ping finds it full
        heartbeat.send_heartbeats();
        assert_eq!(heartbeat.send_heartbeats(), HeartbeatRound { sent: 0, full: 1 });
    }

    #[test]
    fn test_cleanup_keeps_active_connections() {
        let manager = Arc::new(ConnectionManager::new());
        let (tx, _rx) = mpsc::channel(1);
        let handle = manager.register(tx);

        assert_eq!(task(manager).cleanup_stale_connections(60), 0);
        assert!(handle.is_open());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let manager = Arc::new(ConnectionManager::new());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let heartbeat = HeartbeatTask::new(WebSocketConfig::default(), manager, shutdown_rx);

        let running = tokio::spawn(heartbeat.run());
        tokio::task::yield_now().await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), running)
            .await
            .expect("heartbeat task did not stop")
            .unwrap();
    }
}
