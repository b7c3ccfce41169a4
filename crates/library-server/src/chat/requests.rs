//! Request bodies shared by the REST handlers and the websocket gateway

use serde::Deserialize;

use crate::chat::models::{Attachment, MessageKind, MessageTarget};
use crate::core::error::{Error, FieldErrors, Result};
use crate::core::validate::{check_url, is_blank, Validate};

pub const MAX_BODY_LEN: usize = 5000;
pub const MAX_ROOM_LEN: usize = 64;

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    /// Recipient user id (direct message)
    pub to: Option<String>,
    /// Room name (room message)
    pub room: Option<String>,
    #[serde(default)]
    pub body: String,
    pub kind: Option<MessageKind>,
    pub attachment: Option<Attachment>,
}

fn check_target(errors: &mut FieldErrors, to: Option<&str>, room: Option<&str>) {
    match (to, room) {
        (Some(_), Some(_)) | (None, None) => {
            errors.add("to", "exactly one of `to` or `room` is required");
        }
        (Some(to), None) if is_blank(to) => errors.add("to", "is required"),
        (None, Some(room)) => check_room(errors, room),
        _ => {}
    }
}

pub fn check_room(errors: &mut FieldErrors, room: &str) {
    let room = room.trim();
    if room.is_empty() {
        errors.add("room", "is required");
    } else if room.chars().count() > MAX_ROOM_LEN {
        errors.add("room", format!("must be at most {} characters", MAX_ROOM_LEN));
    } else if !room
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        errors.add("room", "may only contain letters, digits, '-', '_' and '.'");
    }
}

impl Validate for SendMessageRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        check_target(errors, self.to.as_deref(), self.room.as_deref());

        if is_blank(&self.body) && self.attachment.is_none() {
            errors.add("body", "message body or attachment is required");
        } else if self.body.chars().count() > MAX_BODY_LEN {
            errors.add("body", format!("must be at most {} characters", MAX_BODY_LEN));
        }

        if let Some(attachment) = &self.attachment {
            check_url(errors, "attachment.url", Some(&attachment.url));
        }

        if self.kind == Some(MessageKind::System) {
            errors.add("kind", "system messages cannot be sent by clients");
        }
    }
}

impl SendMessageRequest {
    pub fn target(&self) -> Result<MessageTarget> {
        match (&self.to, &self.room) {
            (Some(to), None) => Ok(MessageTarget::Direct {
                recipient_id: to.trim().to_string(),
            }),
            (None, Some(room)) => Ok(MessageTarget::Room {
                room_id: room.trim().to_string(),
            }),
            _ => Err(Error::field("to", "exactly one of `to` or `room` is required")),
        }
    }

    /// Explicit kind, or one inferred from the attachment's mime type
    pub fn resolved_kind(&self) -> MessageKind {
        if let Some(kind) = self.kind {
            return kind;
        }
        match &self.attachment {
            Some(a) if a.mime_type.as_deref().is_some_and(|m| m.starts_with("image/")) => {
                MessageKind::Image
            }
            Some(_) => MessageKind::File,
            None => MessageKind::Text,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditMessageRequest {
    pub body: String,
}

impl Validate for EditMessageRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        if is_blank(&self.body) {
            errors.add("body", "is required");
        } else if self.body.chars().count() > MAX_BODY_LEN {
            errors.add("body", format!("must be at most {} characters", MAX_BODY_LEN));
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypingRequest {
    pub to: Option<String>,
    pub room: Option<String>,
    #[serde(default = "default_true", alias = "isTyping")]
    pub is_typing: bool,
}

fn default_true() -> bool {
    true
}

impl Validate for TypingRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        check_target(errors, self.to.as_deref(), self.room.as_deref());
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub before: Option<chrono::DateTime<chrono::Utc>>,
    pub limit: Option<i64>,
}

impl Validate for HistoryQuery {
    fn validate(&self, errors: &mut FieldErrors) {
        if self.limit.is_some_and(|l| l < 1) {
            errors.add("limit", "must be at least 1");
        }
    }
}

impl HistoryQuery {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(to: Option<&str>, room: Option<&str>, body: &str) -> SendMessageRequest {
        SendMessageRequest {
            to: to.map(str::to_string),
            room: room.map(str::to_string),
            body: body.to_string(),
            kind: None,
            attachment: None,
        }
    }

    fn field_errors(err: Error) -> FieldErrors {
        match err {
            Error::Validation(fields) => fields,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_message_is_rejected() {
        let err = request(Some("u2"), None, "   ").check().unwrap_err();
        assert!(field_errors(err).get("body").is_some());
    }

    #[test]
    fn test_attachment_alone_is_enough() {
        let mut req = request(Some("u2"), None, "");
        req.attachment = Some(Attachment {
            url: "https://media.example.com/cat.png".into(),
            name: Some("cat.png".into()),
            mime_type: Some("image/png".into()),
            size: Some(1024),
        });
        assert!(req.check().is_ok());
        assert_eq!(req.resolved_kind(), MessageKind::Image);
    }

    #[test]
    fn test_exactly_one_target() {
        let both = request(Some("u2"), Some("general"), "hi").check().unwrap_err();
        assert!(field_errors(both).get("to").is_some());

        let neither = request(None, None, "hi").check().unwrap_err();
        assert!(field_errors(neither).get("to").is_some());

        let room = request(None, Some("study-group"), "hi");
        assert!(room.check().is_ok());
        assert_eq!(
            room.target().unwrap(),
            MessageTarget::Room {
                room_id: "study-group".into()
            }
        );
    }

    #[test]
    fn test_bad_room_name() {
        let err = request(None, Some("no spaces"), "hi").check().unwrap_err();
        assert!(field_errors(err).get("room").is_some());
    }

    #[test]
    fn test_clients_cannot_send_system_messages() {
        let mut req = request(Some("u2"), None, "hi");
        req.kind = Some(MessageKind::System);
        assert!(field_errors(req.check().unwrap_err()).get("kind").is_some());
    }

    #[test]
    fn test_history_limit_is_clamped() {
        assert_eq!(HistoryQuery::default().limit(), 50);
        let q = HistoryQuery {
            before: None,
            limit: Some(10_000),
        };
        assert_eq!(q.limit(), 200);
    }
}
