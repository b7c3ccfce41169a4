use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::models::PresenceStatus;

/// Body written into a message when it is soft-deleted
pub const TOMBSTONE: &str = "This message was deleted";

/// Canonical identifier of a two-party conversation.
///
/// The participants are kept in sorted order, so `new(a, b) == new(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    low: String,
    high: String,
}

impl ConversationKey {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.low == user_id || self.high == user_id
    }

    /// The other participant, if `user_id` is one of them
    pub fn counterpart(&self, user_id: &str) -> Option<&str> {
        if self.low == user_id {
            Some(&self.high)
        } else if self.high == user_id {
            Some(&self.low)
        } else {
            None
        }
    }
}

/// Where a message is addressed; exactly one mode per message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "addressing", rename_all = "snake_case")]
pub enum MessageTarget {
    Direct { recipient_id: String },
    Room { room_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
    System,
}

/// File reference; the bytes live with an external media host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    #[serde(flatten)]
    pub target: MessageTarget,
    pub body: String,
    pub kind: MessageKind,
    pub attachment: Option<Attachment>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn conversation_key(&self) -> Option<ConversationKey> {
        match &self.target {
            MessageTarget::Direct { recipient_id } => {
                Some(ConversationKey::new(&self.sender_id, recipient_id))
            }
            MessageTarget::Room { .. } => None,
        }
    }

    pub fn recipient_id(&self) -> Option<&str> {
        match &self.target {
            MessageTarget::Direct { recipient_id } => Some(recipient_id),
            MessageTarget::Room { .. } => None,
        }
    }

    pub fn room_id(&self) -> Option<&str> {
        match &self.target {
            MessageTarget::Room { room_id } => Some(room_id),
            MessageTarget::Direct { .. } => None,
        }
    }
}

/// Sender display fields attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderInfo {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A message as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub sender: SenderInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterpart {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub status: PresenceStatus,
}

/// One entry of a user's inbox: latest message per counterpart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub counterpart: Counterpart,
    pub last_message: MessageView,
    pub unread_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_key_is_order_independent() {
        let ab = ConversationKey::new("alice", "bob");
        let ba = ConversationKey::new("bob", "alice");
        assert_eq!(ab, ba);
        assert_eq!(ab.low(), "alice");
        assert_eq!(ab.high(), "bob");
    }

    #[test]
    fn test_conversation_key_does_not_collide_on_separators() {
        // A formatted "a_b" string key would make these two equal.
        let one = ConversationKey::new("a_b", "c");
        let two = ConversationKey::new("a", "b_c");
        assert_ne!(one, two);
    }

    #[test]
    fn test_counterpart() {
        let key = ConversationKey::new("u1", "u2");
        assert_eq!(key.counterpart("u1"), Some("u2"));
        assert_eq!(key.counterpart("u2"), Some("u1"));
        assert_eq!(key.counterpart("u3"), None);
        assert!(key.contains("u2"));
        assert!(!key.contains("u3"));
    }

    #[test]
    fn test_message_target_serializes_flat() {
        let msg = Message {
            id: "m1".into(),
            sender_id: "u1".into(),
            target: MessageTarget::Direct {
                recipient_id: "u2".into(),
            },
            body: "hi".into(),
            kind: MessageKind::Text,
            attachment: None,
            is_read: false,
            read_at: None,
            is_edited: false,
            edited_at: None,
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["addressing"], "direct");
        assert_eq!(json["recipient_id"], "u2");
        assert_eq!(json["kind"], "text");
        assert_eq!(msg.conversation_key(), Some(ConversationKey::new("u2", "u1")));
        assert_eq!(msg.room_id(), None);
    }
}
