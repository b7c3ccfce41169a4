//! Message store
//!
//! Persists chat messages for direct conversations and rooms. Messages are
//! never removed: edits, reads and deletes only flip one-way flags, and a
//! deleted message keeps its id while its body becomes [`TOMBSTONE`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chat::models::{
    Attachment, ConversationKey, ConversationSummary, Counterpart, Message, MessageKind,
    MessageTarget, MessageView, SenderInfo, TOMBSTONE,
};
use crate::core::error::{Error, Result};
use crate::core::models::PresenceStatus;

const MESSAGE_SELECT: &str = "SELECT m.id, m.sender_id, m.recipient_id, m.room_id, m.body, m.kind, \
     m.attachment_url, m.attachment_name, m.attachment_mime, m.attachment_size, \
     m.is_read, m.read_at, m.is_edited, m.edited_at, m.is_deleted, m.deleted_at, m.created_at, \
     m.rowid AS seq, u.name AS sender_name, u.avatar_url AS sender_avatar_url \
     FROM messages m JOIN users u ON u.id = m.sender_id";

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: String,
    sender_id: String,
    recipient_id: Option<String>,
    room_id: Option<String>,
    body: String,
    kind: MessageKind,
    attachment_url: Option<String>,
    attachment_name: Option<String>,
    attachment_mime: Option<String>,
    attachment_size: Option<i64>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    is_edited: bool,
    edited_at: Option<DateTime<Utc>>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    sender_name: String,
    sender_avatar_url: Option<String>,
}

impl TryFrom<MessageRow> for MessageView {
    type Error = Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        let target = match (row.recipient_id, row.room_id) {
            (Some(recipient_id), None) => MessageTarget::Direct { recipient_id },
            (None, Some(room_id)) => MessageTarget::Room { room_id },
            _ => {
                return Err(Error::Internal(format!(
                    "message {} has no single addressing mode",
                    row.id
                )))
            }
        };

        let attachment = row.attachment_url.map(|url| Attachment {
            url,
            name: row.attachment_name,
            mime_type: row.attachment_mime,
            size: row.attachment_size,
        });

        Ok(MessageView {
            sender: SenderInfo {
                id: row.sender_id.clone(),
                name: row.sender_name,
                avatar_url: row.sender_avatar_url,
            },
            message: Message {
                id: row.id,
                sender_id: row.sender_id,
                target,
                body: row.body,
                kind: row.kind,
                attachment,
                is_read: row.is_read,
                read_at: row.read_at,
                is_edited: row.is_edited,
                edited_at: row.edited_at,
                is_deleted: row.is_deleted,
                deleted_at: row.deleted_at,
                created_at: row.created_at,
            },
        })
    }
}

fn into_views(rows: Vec<MessageRow>) -> Result<Vec<MessageView>> {
    rows.into_iter().map(MessageView::try_from).collect()
}

pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init_db().await?;
        info!("[Messages] Initialized");
        Ok(store)
    }

    async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                recipient_id TEXT,
                room_id TEXT,
                conv_low TEXT,
                conv_high TEXT,
                body TEXT NOT NULL,
                kind TEXT NOT NULL DEFAULT 'text',
                attachment_url TEXT,
                attachment_name TEXT,
                attachment_mime TEXT,
                attachment_size INTEGER,
                is_read INTEGER NOT NULL DEFAULT 0,
                read_at TEXT,
                is_edited INTEGER NOT NULL DEFAULT 0,
                edited_at TEXT,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                deleted_at TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (sender_id) REFERENCES users(id),
                FOREIGN KEY (recipient_id) REFERENCES users(id),
                CHECK ((recipient_id IS NULL) <> (room_id IS NULL)),
                CHECK ((recipient_id IS NULL) = (conv_low IS NULL))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation \
             ON messages (conv_low, conv_high, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_room ON messages (room_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist a new message and return it with sender display fields.
    ///
    /// Direct recipients must exist, be active, and differ from the sender.
    pub async fn send(
        &self,
        sender_id: &str,
        target: MessageTarget,
        body: &str,
        kind: MessageKind,
        attachment: Option<Attachment>,
    ) -> Result<MessageView> {
        if body.trim().is_empty() && attachment.is_none() {
            return Err(Error::field("body", "message body or attachment is required"));
        }

        let (recipient_id, room_id, key) = match &target {
            MessageTarget::Direct { recipient_id } => {
                if recipient_id == sender_id {
                    return Err(Error::field("to", "cannot send a message to yourself"));
                }
                self.ensure_active_user(recipient_id).await?;
                let key = ConversationKey::new(sender_id, recipient_id.as_str());
                (Some(recipient_id.as_str()), None, Some(key))
            }
            MessageTarget::Room { room_id } => (None, Some(room_id.as_str()), None),
        };

        let id = Uuid::new_v4().to_string();
        let (url, name, mime, size) = match &attachment {
            Some(a) => (Some(&a.url), a.name.as_ref(), a.mime_type.as_ref(), a.size),
            None => (None, None, None, None),
        };

        sqlx::query(
            "INSERT INTO messages (id, sender_id, recipient_id, room_id, conv_low, conv_high, body, kind, \
             attachment_url, attachment_name, attachment_mime, attachment_size, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(sender_id)
        .bind(recipient_id)
        .bind(room_id)
        .bind(key.as_ref().map(ConversationKey::low))
        .bind(key.as_ref().map(ConversationKey::high))
        .bind(body.trim())
        .bind(kind)
        .bind(url)
        .bind(name)
        .bind(mime)
        .bind(size)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!("[Messages] {} sent {} ({:?})", sender_id, id, target);

        self.get(&id).await
    }

    async fn ensure_active_user(&self, user_id: &str) -> Result<()> {
        let active: Option<(bool,)> = sqlx::query_as("SELECT is_active FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match active {
            Some((true,)) => Ok(()),
            _ => Err(Error::NotFound("Recipient")),
        }
    }

    pub async fn get(&self, message_id: &str) -> Result<MessageView> {
        let row: Option<MessageRow> = sqlx::query_as(&format!("{} WHERE m.id = ?", MESSAGE_SELECT))
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or(Error::NotFound("Message"))?.try_into()
    }

    /// Replace the body of a message; only its sender may, and not after deletion
    pub async fn edit(&self, message_id: &str, requester: &str, new_body: &str) -> Result<MessageView> {
        let current = self.get(message_id).await?;

        if current.message.sender_id != requester {
            return Err(Error::Forbidden("Only the sender can edit this message".to_string()));
        }
        if current.message.is_deleted {
            return Err(Error::BadRequest("Deleted messages cannot be edited".to_string()));
        }
        if new_body.trim().is_empty() {
            return Err(Error::field("body", "is required"));
        }

        let result = sqlx::query(
            "UPDATE messages SET body = ?, is_edited = 1, edited_at = ? \
             WHERE id = ? AND sender_id = ? AND is_deleted = 0",
        )
        .bind(new_body.trim())
        .bind(Utc::now())
        .bind(message_id)
        .bind(requester)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Deleted between the read and the update
            return Err(Error::BadRequest("Deleted messages cannot be edited".to_string()));
        }

        info!("[Messages] {} edited by {}", message_id, requester);
        self.get(message_id).await
    }

    /// Tombstone a message; only its sender may. Deleting twice is a no-op.
    pub async fn soft_delete(&self, message_id: &str, requester: &str) -> Result<MessageView> {
        let current = self.get(message_id).await?;

        if current.message.sender_id != requester {
            return Err(Error::Forbidden("Only the sender can delete this message".to_string()));
        }
        if current.message.is_deleted {
            return Ok(current);
        }

        sqlx::query(
            "UPDATE messages SET body = ?, attachment_url = NULL, attachment_name = NULL, \
             attachment_mime = NULL, attachment_size = NULL, is_deleted = 1, deleted_at = ? \
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(TOMBSTONE)
        .bind(Utc::now())
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        info!("[Messages] {} deleted by {}", message_id, requester);
        self.get(message_id).await
    }

    /// Mark every unread message addressed to `reader` in the conversation as
    /// read. Returns how many changed.
    pub async fn mark_read(&self, key: &ConversationKey, reader: &str) -> Result<u64> {
        if !key.contains(reader) {
            return Err(Error::Forbidden("Not a participant in this conversation".to_string()));
        }

        let result = sqlx::query(
            "UPDATE messages SET is_read = 1, read_at = ? \
             WHERE conv_low = ? AND conv_high = ? AND recipient_id = ? AND is_read = 0 AND is_deleted = 0",
        )
        .bind(Utc::now())
        .bind(key.low())
        .bind(key.high())
        .bind(reader)
        .execute(&self.pool)
        .await?;

        let count = result.rows_affected();
        if count > 0 {
            debug!("[Messages] {} read {} messages", reader, count);
        }
        Ok(count)
    }

    /// Latest non-deleted direct message per counterpart, newest first, with
    /// the number of unread messages the counterpart sent to `user_id`.
    pub async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "{} WHERE m.room_id IS NULL AND m.is_deleted = 0 \
             AND (m.sender_id = ? OR m.recipient_id = ?) \
             ORDER BY m.created_at DESC, m.rowid DESC",
            MESSAGE_SELECT
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, MessageView> = HashMap::new();
        let mut unread: HashMap<String, i64> = HashMap::new();

        for view in into_views(rows)? {
            let Some(counterpart) = view
                .message
                .conversation_key()
                .and_then(|key| key.counterpart(user_id).map(str::to_string))
            else {
                continue;
            };

            if view.message.recipient_id() == Some(user_id) && !view.message.is_read {
                *unread.entry(counterpart.clone()).or_default() += 1;
            }

            if !latest.contains_key(&counterpart) {
                order.push(counterpart.clone());
                latest.insert(counterpart, view);
            }
        }

        let mut summaries = Vec::with_capacity(order.len());
        for counterpart_id in order {
            let Some(last_message) = latest.remove(&counterpart_id) else {
                continue;
            };
            let counterpart = self.counterpart(&counterpart_id).await?;
            summaries.push(ConversationSummary {
                unread_count: unread.get(&counterpart_id).copied().unwrap_or(0),
                counterpart,
                last_message,
            });
        }

        Ok(summaries)
    }

    async fn counterpart(&self, user_id: &str) -> Result<Counterpart> {
        let row: Option<(String, String, Option<String>, PresenceStatus)> =
            sqlx::query_as("SELECT id, name, avatar_url, status FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let (id, name, avatar_url, status) = row.ok_or(Error::NotFound("User"))?;
        Ok(Counterpart {
            id,
            name,
            avatar_url,
            status,
        })
    }

    /// Direct messages of a conversation, oldest first; deleted ones appear as tombstones
    pub async fn conversation_history(
        &self,
        key: &ConversationKey,
        viewer: &str,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<MessageView>> {
        if !key.contains(viewer) {
            return Err(Error::Forbidden("Not a participant in this conversation".to_string()));
        }

        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT * FROM ({} WHERE m.conv_low = ? AND m.conv_high = ? \
             AND (? IS NULL OR m.created_at < ?) \
             ORDER BY m.created_at DESC, m.rowid DESC LIMIT ?) \
             ORDER BY created_at ASC, seq ASC",
            MESSAGE_SELECT
        ))
        .bind(key.low())
        .bind(key.high())
        .bind(before)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        into_views(rows)
    }

    /// Messages posted to a room, oldest first
    pub async fn room_history(
        &self,
        room_id: &str,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<MessageView>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT * FROM ({} WHERE m.room_id = ? \
             AND (? IS NULL OR m.created_at < ?) \
             ORDER BY m.created_at DESC, m.rowid DESC LIMIT ?) \
             ORDER BY created_at ASC, seq ASC",
            MESSAGE_SELECT
        ))
        .bind(room_id)
        .bind(before)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        into_views(rows)
    }

    /// Unread direct messages addressed to `user_id`, across all conversations
    pub async fn unread_count(&self, user_id: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages WHERE recipient_id = ? AND is_read = 0 AND is_deleted = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
