use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A logged-in identity, bound to exactly one connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Random v4 UUID, fresh for every login
    pub id: Uuid,
    pub username: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub range: f64,
}

impl Session {
    pub fn new(username: impl Into<String>, range: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            lat: None,
            lng: None,
            range,
        }
    }

    /// Both coordinates have been reported
    pub fn is_located(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }

    pub fn set_position(&mut self, lat: f64, lng: f64) {
        self.lat = Some(lat);
        self.lng = Some(lng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_unlocated() {
        let session = Session::new("alice", 1000.0);
        assert_eq!(session.username, "alice");
        assert_eq!(session.range, 1000.0);
        assert!(!session.is_located());
    }

    #[test]
    fn test_set_position_overwrites() {
        let mut session = Session::new("alice", 1000.0);
        session.set_position(1.0, 2.0);
        session.set_position(3.0, 4.0);
        assert_eq!((session.lat, session.lng), (Some(3.0), Some(4.0)));
        assert!(session.is_located());
    }

    #[test]
    fn test_ids_differ_per_login() {
        assert_ne!(Session::new("alice", 1.0).id, Session::new("alice", 1.0).id);
    }
}
