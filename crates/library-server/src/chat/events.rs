//! Real-time event payloads
//!
//! Frames are JSON objects of the form `{"event": "<name>", "data": {...}}`.

use serde::{Deserialize, Serialize};

use crate::chat::models::MessageView;
use crate::chat::requests::{SendMessageRequest, TypingRequest};

/// Events pushed to connected clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Direct message delivered to its recipient
    NewMessage(MessageView),
    /// Echo of a message the connection's user just sent
    MessageSent(MessageView),
    MessageEdited(MessageView),
    MessageDeleted(MessageView),
    MessagesRead {
        reader_id: String,
        count: u64,
    },
    UserOnline {
        user_id: String,
    },
    UserOffline {
        user_id: String,
    },
    UserTyping {
        user_id: String,
        room: Option<String>,
        is_typing: bool,
    },
    #[serde(rename = "room-message")]
    RoomMessage(MessageView),
    Joined {
        room: String,
    },
    Left {
        room: String,
    },
    Error {
        message: String,
    },
}

/// Events sent by clients over the socket
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Join { room: String },
    Leave { room: String },
    SendMessage(SendMessageRequest),
    Typing(TypingRequest),
    MarkRead { with: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_event_names() {
        let online = serde_json::to_value(ServerEvent::UserOnline {
            user_id: "u1".into(),
        })
        .unwrap();
        assert_eq!(online["event"], "userOnline");
        assert_eq!(online["data"]["user_id"], "u1");

        let typing = serde_json::to_value(ServerEvent::UserTyping {
            user_id: "u1".into(),
            room: None,
            is_typing: true,
        })
        .unwrap();
        assert_eq!(typing["event"], "userTyping");
    }

    #[test]
    fn test_client_event_parsing() {
        let join: ClientEvent =
            serde_json::from_str(r#"{"event":"join","data":{"room":"general"}}"#).unwrap();
        assert!(matches!(join, ClientEvent::Join { room } if room == "general"));

        let send: ClientEvent = serde_json::from_str(
            r#"{"event":"sendMessage","data":{"to":"u2","body":"hello"}}"#,
        )
        .unwrap();
        match send {
            ClientEvent::SendMessage(req) => {
                assert_eq!(req.to.as_deref(), Some("u2"));
                assert_eq!(req.body, "hello");
            }
            other => panic!("unexpected {other:?}"),
        }

        let typing: ClientEvent =
            serde_json::from_str(r#"{"event":"typing","data":{"room":"general"}}"#).unwrap();
        assert!(matches!(typing, ClientEvent::Typing(t) if t.is_typing));

        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"nope"}"#).is_err());
    }
}
