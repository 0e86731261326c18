use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::presence::Session;

/// Envelopes sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Claim an identity for this connection
    Login { username: String },
    /// Public chat when `to` is absent or empty, private otherwise
    Chat {
        msg: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
    },
    /// Overwrite own coordinates
    Position { lat: f64, lng: f64 },
}

impl ClientMessage {
    /// Decode one text frame. Anything that is not a well-formed envelope of a
    /// known kind is reported as [`AppError::MalformedEnvelope`].
    pub fn decode(text: &str) -> Result<Self, AppError> {
        serde_json::from_str(text).map_err(AppError::MalformedEnvelope)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Login { .. } => "login",
            ClientMessage::Chat { .. } => "chat",
            ClientMessage::Position { .. } => "position",
        }
    }
}

/// A delivered chat line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    /// Milliseconds since the Unix epoch
    pub time: i64,
}

impl ChatMessage {
    pub fn public(from: impl Into<String>, msg: impl Into<String>, time: i64) -> Self {
        Self {
            from: from.into(),
            to: None,
            msg: msg.into(),
            private: None,
            time,
        }
    }

    pub fn private(
        from: impl Into<String>,
        to: impl Into<String>,
        msg: impl Into<String>,
        time: i64,
    ) -> Self {
        Self {
            from: from.into(),
            to: Some(to.into()),
            msg: msg.into(),
            private: Some(true),
            time,
        }
    }
}

/// Envelopes sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Login acknowledgement, sent only to the connection that logged in
    #[serde(rename = "self")]
    SelfNotice { user: Session },
    /// Full presence snapshot
    #[serde(rename = "users")]
    Users { list: Vec<Session> },
    #[serde(rename = "chat")]
    Chat(ChatMessage),
}

impl ServerMessage {
    pub fn self_notice(user: Session) -> Self {
        Self::SelfNotice { user }
    }

    pub fn users(list: Vec<Session>) -> Self {
        Self::Users { list }
    }

    pub fn chat(message: ChatMessage) -> Self {
        Self::Chat(message)
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string(self).map_err(AppError::Serialization)
    }
}

/// What a connection's writer task receives from its queue
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Serialized by the writer task
    Raw(ServerMessage),
    /// Serialized once and shared across a fan-out
    Preserialized(Arc<str>),
    /// WebSocket ping frame
    Ping,
}

impl OutboundMessage {
    pub fn preserialize(message: &ServerMessage) -> Result<Self, AppError> {
        Ok(Self::Preserialized(Arc::from(message.to_json()?)))
    }

    /// Text payload for this message; `None` for control frames
    pub fn to_json(&self) -> Result<Option<String>, AppError> {
        match self {
            OutboundMessage::Raw(message) => message.to_json().map(Some),
            OutboundMessage::Preserialized(text) => Ok(Some(text.to_string())),
            OutboundMessage::Ping => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_decode_login() {
        let msg = ClientMessage::decode(r#"{"type":"login","username":"alice"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Login {
                username: "alice".to_string()
            }
        );
        assert_eq!(msg.kind(), "login");
    }

    #[test]
    fn test_decode_chat_with_and_without_target() {
        let public = ClientMessage::decode(r#"{"type":"chat","msg":"hi"}"#).unwrap();
        assert_eq!(
            public,
            ClientMessage::Chat {
                msg: "hi".to_string(),
                to: None
            }
        );

        let private = ClientMessage::decode(r#"{"type":"chat","msg":"hi","to":"bob"}"#).unwrap();
        assert_eq!(
            private,
            ClientMessage::Chat {
                msg: "hi".to_string(),
                to: Some("bob".to_string())
            }
        );
    }

    #[test]
    fn test_decode_position() {
        let msg = ClientMessage::decode(r#"{"type":"position","lat":1.5,"lng":-2}"#).unwrap();
        assert_eq!(msg, ClientMessage::Position { lat: 1.5, lng: -2.0 });
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let cases = [
            "not json",
            "{}",
            r#"{"type":"dance"}"#,
            r#"{"type":"login"}"#,
            r#"{"type":"chat"}"#,
            r#"{"type":"position","lat":"north","lng":2}"#,
            r#"{"type":"position","lat":1}"#,
        ];
        for case in cases {
            let err = ClientMessage::decode(case).unwrap_err();
            assert!(matches!(err, AppError::MalformedEnvelope(_)), "case {case}");
        }
    }

    #[test]
    fn test_self_notice_wire_format() {
        let id = Uuid::new_v4();
        let session = Session {
            id,
            username: "alice".to_string(),
            lat: None,
            lng: None,
            range: 1000.0,
        };
        let value: serde_json::Value =
            serde_json::from_str(&ServerMessage::self_notice(session).to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "self",
                "user": {
                    "id": id.to_string(),
                    "username": "alice",
                    "lat": null,
                    "lng": null,
                    "range": 1000.0
                }
            })
        );
    }

    #[test]
    fn test_chat_wire_format() {
        let public = serde_json::to_value(ServerMessage::chat(ChatMessage::public("alice", "hi", 42))).unwrap();
        assert_eq!(public, json!({"type": "chat", "from": "alice", "msg": "hi", "time": 42}));

        let private =
            serde_json::to_value(ServerMessage::chat(ChatMessage::private("alice", "bob", "hi", 42))).unwrap();
        assert_eq!(
            private,
            json!({"type": "chat", "from": "alice", "to": "bob", "msg": "hi", "private": true, "time": 42})
        );
    }

    #[test]
    fn test_preserialized_matches_raw() {
        let message = ServerMessage::users(vec![]);
        let raw = OutboundMessage::Raw(message.clone()).to_json().unwrap();
        let pre = OutboundMessage::preserialize(&message).unwrap().to_json().unwrap();
        assert_eq!(raw, pre);
        assert_eq!(raw.as_deref(), Some(r#"{"type":"users","list":[]}"#));
        assert!(OutboundMessage::Ping.to_json().unwrap().is_none());
    }
}
