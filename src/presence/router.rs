use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::PresenceConfig;
use crate::connection_manager::{ConnectionHandle, ConnectionManager};
use crate::metrics::{ConnectionMetrics, EnvelopeMetrics};
use crate::websocket::{ChatMessage, ClientMessage, ServerMessage};

use super::{Broadcaster, ConnectionRegistry, Session};

/// Statistics for the message router
#[derive(Debug, Default)]
pub struct RouterStats {
    pub logins: AtomicU64,
    pub evictions: AtomicU64,
    pub public_chats: AtomicU64,
    pub private_chats: AtomicU64,
    pub position_updates: AtomicU64,
    pub disconnects: AtomicU64,
    pub dropped_malformed: AtomicU64,
    pub dropped_no_session: AtomicU64,
    pub dropped_unknown_target: AtomicU64,
}

impl RouterStats {
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            logins: self.logins.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            public_chats: self.public_chats.load(Ordering::Relaxed),
            private_chats: self.private_chats.load(Ordering::Relaxed),
            position_updates: self.position_updates.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            dropped_malformed: self.dropped_malformed.load(Ordering::Relaxed),
            dropped_no_session: self.dropped_no_session.load(Ordering::Relaxed),
            dropped_unknown_target: self.dropped_unknown_target.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of router statistics
#[derive(Debug, Clone, Serialize)]
pub struct RouterStatsSnapshot {
    pub logins: u64,
    pub evictions: u64,
    pub public_chats: u64,
    pub private_chats: u64,
    pub position_updates: u64,
    pub disconnects: u64,
    pub dropped_malformed: u64,
    pub dropped_no_session: u64,
    pub dropped_unknown_target: u64,
}

/// Decodes inbound envelopes and routes them.
///
/// The registry lock is the single sequencing point: one envelope is decoded,
/// applied to the registry and fanned out completely before the next one (from
/// any connection) is admitted. Outbound sends never wait, so holding the lock
/// across them cannot stall on a slow client.
pub struct MessageRouter {
    registry: Mutex<ConnectionRegistry>,
    broadcaster: Broadcaster,
    stats: RouterStats,
}

impl MessageRouter {
    pub fn new(connections: Arc<ConnectionManager>, config: &PresenceConfig) -> Self {
        Self {
            registry: Mutex::new(ConnectionRegistry::new(config.default_range)),
            broadcaster: Broadcaster::new(connections, config.hide_unlocated),
            stats: RouterStats::default(),
        }
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Handle one text frame from `connection`.
    ///
    /// Frames that fail to decode are dropped with no reply.
    pub async fn handle_text(&self, connection: &Arc<ConnectionHandle>, text: &str) {
        match ClientMessage::decode(text) {
            Ok(message) => self.dispatch(connection, message).await,
            Err(e) => {
                self.stats.dropped_malformed.fetch_add(1, Ordering::Relaxed);
                EnvelopeMetrics::record_malformed();
                tracing::debug!(connection_id = %connection.id, error = %e, "Dropping malformed envelope");
            }
        }
    }

    /// Route a decoded envelope
    #[tracing::instrument(
        name = "router.dispatch",
        skip(self, connection, message),
        fields(connection_id = %connection.id, kind = message.kind())
    )]
    pub async fn dispatch(&self, connection: &Arc<ConnectionHandle>, message: ClientMessage) {
        EnvelopeMetrics::record_received(message.kind());

        let mut registry = self.registry.lock().await;
        // Evicted or closed while this envelope waited for the lock
        if !connection.is_open() {
            self.drop_no_session(connection, message.kind());
            return;
        }

        match message {
            ClientMessage::Login { username } => self.handle_login(&mut registry, connection, &username),
            ClientMessage::Chat { msg, to } => {
                let target = to.filter(|to| !to.is_empty());
                self.handle_chat(&registry, connection, msg, target)
            }
            ClientMessage::Position { lat, lng } => {
                self.handle_position(&mut registry, connection, lat, lng)
            }
        }
    }

    fn handle_login(
        &self,
        registry: &mut ConnectionRegistry,
        connection: &Arc<ConnectionHandle>,
        username: &str,
    ) {
        let registration = registry.register(connection, username);

        self.stats.logins.fetch_add(1, Ordering::Relaxed);
        if registration.evicted.is_some() {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            ConnectionMetrics::record_eviction();
        }
        ConnectionMetrics::set_active_sessions(registry.len());

        tracing::info!(
            connection_id = %connection.id,
            username = %username,
            session_id = %registration.session.id,
            "User logged in"
        );

        self.broadcaster
            .send(connection, ServerMessage::self_notice(registration.session));
        self.broadcaster.presence_broadcast(registry);
    }

    fn handle_chat(
        &self,
        registry: &ConnectionRegistry,
        connection: &Arc<ConnectionHandle>,
        msg: String,
        to: Option<String>,
    ) {
        let Some(sender) = registry.session_for(connection.id) else {
            self.drop_no_session(connection, "chat");
            return;
        };
        let time = Utc::now().timestamp_millis();

        let Some(to) = to else {
            self.stats.public_chats.fetch_add(1, Ordering::Relaxed);
            let message = ServerMessage::chat(ChatMessage::public(sender.username.clone(), msg, time));
            let result = self.broadcaster.broadcast(&message);
            tracing::debug!(from = %sender.username, delivered = result.delivered, "Public chat");
            return;
        };

        let Some(target) = registry.connection_for(&to) else {
            self.stats.dropped_unknown_target.fetch_add(1, Ordering::Relaxed);
            EnvelopeMetrics::record_unknown_target();
            tracing::debug!(from = %sender.username, to = %to, "Dropping private chat to unknown user");
            return;
        };

        self.stats.private_chats.fetch_add(1, Ordering::Relaxed);
        let message = ServerMessage::chat(ChatMessage::private(sender.username.clone(), to, msg, time));
        // Target first, then the echo to the sender
        let result = self
            .broadcaster
            .send_to(&[target.as_ref(), connection.as_ref()], &message);
        tracing::debug!(from = %sender.username, delivered = result.delivered, "Private chat");
    }

    fn handle_position(
        &self,
        registry: &mut ConnectionRegistry,
        connection: &Arc<ConnectionHandle>,
        lat: f64,
        lng: f64,
    ) {
        if registry.update_position(connection.id, lat, lng).is_none() {
            self.drop_no_session(connection, "position");
            return;
        }

        self.stats.position_updates.fetch_add(1, Ordering::Relaxed);
        self.broadcaster.presence_broadcast(registry);
    }

    fn drop_no_session(&self, connection: &ConnectionHandle, kind: &str) {
        self.stats.dropped_no_session.fetch_add(1, Ordering::Relaxed);
        EnvelopeMetrics::record_no_session();
        tracing::debug!(connection_id = %connection.id, kind = kind, "Dropping envelope from connection without session");
    }

    /// Release the session owned by a closed connection.
    ///
    /// Broadcasts presence only when a session was actually removed; an
    /// evicted connection's late disconnect is a no-op.
    pub async fn disconnect(&self, connection_id: Uuid) -> Option<Session> {
        let mut registry = self.registry.lock().await;
        let session = registry.unregister(connection_id)?;

        self.stats.disconnects.fetch_add(1, Ordering::Relaxed);
        ConnectionMetrics::set_active_sessions(registry.len());
        tracing::info!(connection_id = %connection_id, username = %session.username, "User went offline");

        self.broadcaster.presence_broadcast(&registry);
        Some(session)
    }

    /// Current `users` snapshot, with the same policy as the broadcast
    pub async fn presence_snapshot(&self) -> Vec<Session> {
        let registry = self.registry.lock().await;
        self.broadcaster.presence_list(&registry)
    }

    pub async fn find_session(&self, username: &str) -> Option<Session> {
        let registry = self.registry.lock().await;
        let connection = registry.connection_for(username)?;
        registry.session_for(connection.id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.registry.lock().await.len()
    }
}
