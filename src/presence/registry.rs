use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::connection_manager::ConnectionHandle;

use super::Session;

struct SessionEntry {
    /// Login order, used to keep snapshots stable
    seq: u64,
    session: Session,
}

/// Outcome of a successful login
#[derive(Debug, Clone)]
pub struct Registration {
    pub session: Session,
    /// Connection that held the username before this login, now closed
    pub evicted: Option<Arc<ConnectionHandle>>,
}

/// Bidirectional mapping between live connections and sessions.
///
/// Invariants:
/// - a connection owns at most one session
/// - a username maps to at most one connection
/// - `usernames[u] == c` implies `sessions[c].username == u`, and vice versa
///
/// Both maps are only touched through the methods below.
pub struct ConnectionRegistry {
    /// connection_id -> Session
    sessions: HashMap<Uuid, SessionEntry>,
    /// username -> ConnectionHandle
    usernames: HashMap<String, Arc<ConnectionHandle>>,
    next_seq: u64,
    default_range: f64,
}

impl ConnectionRegistry {
    pub fn new(default_range: f64) -> Self {
        Self {
            sessions: HashMap::new(),
            usernames: HashMap::new(),
            next_seq: 0,
            default_range,
        }
    }

    /// Bind `username` to `connection` with a fresh session.
    ///
    /// If another connection holds `username` it is closed and its session
    /// removed first. If `connection` already owns a session (re-login), that
    /// session is replaced without closing the connection.
    pub fn register(&mut self, connection: &Arc<ConnectionHandle>, username: &str) -> Registration {
        let evicted = match self.usernames.get(username) {
            Some(old) if old.id != connection.id => {
                let old = old.clone();
                self.remove(old.id);
                old.close();
                tracing::info!(
                    username = %username,
                    evicted_connection_id = %old.id,
                    connection_id = %connection.id,
                    "Evicting previous connection for username"
                );
                Some(old)
            }
            _ => None,
        };

        // Re-login on the same connection drops its previous identity
        self.remove(connection.id);

        let session = Session::new(username, self.default_range);
        let seq = self.next_seq;
        self.next_seq += 1;

        self.sessions.insert(
            connection.id,
            SessionEntry {
                seq,
                session: session.clone(),
            },
        );
        self.usernames.insert(username.to_string(), connection.clone());

        Registration { session, evicted }
    }

    /// Remove the session owned by `connection_id`, if any. Idempotent.
    ///
    /// The username entry is only removed while it still points at this
    /// connection, so a late disconnect of an evicted connection cannot drop
    /// the mapping of the login that replaced it.
    pub fn unregister(&mut self, connection_id: Uuid) -> Option<Session> {
        self.remove(connection_id)
    }

    fn remove(&mut self, connection_id: Uuid) -> Option<Session> {
        let entry = self.sessions.remove(&connection_id)?;
        let owned = self
            .usernames
            .get(&entry.session.username)
            .is_some_and(|holder| holder.id == connection_id);
        if owned {
            self.usernames.remove(&entry.session.username);
        }
        Some(entry.session)
    }

    pub fn session_for(&self, connection_id: Uuid) -> Option<&Session> {
        self.sessions.get(&connection_id).map(|entry| &entry.session)
    }

    pub fn connection_for(&self, username: &str) -> Option<Arc<ConnectionHandle>> {
        self.usernames.get(username).cloned()
    }

    /// Overwrite the coordinates of the session owned by `connection_id`
    pub fn update_position(&mut self, connection_id: Uuid, lat: f64, lng: f64) -> Option<&Session> {
        let entry = self.sessions.get_mut(&connection_id)?;
        entry.session.set_position(lat, lng);
        Some(&entry.session)
    }

    /// Snapshot of every session, in login order
    pub fn all_sessions(&self) -> Vec<Session> {
        let mut entries: Vec<&SessionEntry> = self.sessions.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.session.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
