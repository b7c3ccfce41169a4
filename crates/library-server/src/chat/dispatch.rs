//! Store operations followed by real-time fan-out.
//!
//! Both the REST handlers and the websocket gateway go through here, so a
//! message sent over HTTP reaches online clients the same way one sent over
//! the socket does.

use tracing::debug;

use crate::chat::events::ServerEvent;
use crate::chat::models::{ConversationKey, MessageTarget, MessageView};
use crate::chat::requests::{EditMessageRequest, SendMessageRequest, TypingRequest};
use crate::core::error::Result;
use crate::core::validate::Validate;
use crate::core::AppState;

/// Persist a message, then deliver it: `newMessage` to a direct recipient,
/// `room-message` to room members, and `messageSent` back to the sender.
pub async fn send_message(
    state: &AppState,
    sender_id: &str,
    req: SendMessageRequest,
) -> Result<MessageView> {
    req.check()?;
    let target = req.target()?;
    let kind = req.resolved_kind();

    let view = state
        .messages
        .send(sender_id, target, &req.body, kind, req.attachment)
        .await?;

    match &view.message.target {
        MessageTarget::Direct { recipient_id } => {
            state
                .presence
                .route_to(recipient_id, ServerEvent::NewMessage(view.clone()));
        }
        MessageTarget::Room { room_id } => {
            let delivered = state.presence.broadcast_room(
                room_id,
                &ServerEvent::RoomMessage(view.clone()),
                state.presence.connection_for(sender_id),
            );
            debug!("[Messages] room {} fan-out to {} connections", room_id, delivered);
        }
    }

    state
        .presence
        .route_to(sender_id, ServerEvent::MessageSent(view.clone()));

    Ok(view)
}

pub async fn edit_message(
    state: &AppState,
    requester: &str,
    message_id: &str,
    req: EditMessageRequest,
) -> Result<MessageView> {
    req.check()?;
    let view = state.messages.edit(message_id, requester, &req.body).await?;
    notify_change(state, ServerEvent::MessageEdited(view.clone()), &view);
    Ok(view)
}

pub async fn delete_message(
    state: &AppState,
    requester: &str,
    message_id: &str,
) -> Result<MessageView> {
    let view = state.messages.soft_delete(message_id, requester).await?;
    notify_change(state, ServerEvent::MessageDeleted(view.clone()), &view);
    Ok(view)
}

/// Edits and deletes reach both participants of a direct conversation, or
/// every member of the room.
fn notify_change(state: &AppState, event: ServerEvent, view: &MessageView) {
    match &view.message.target {
        MessageTarget::Direct { recipient_id } => {
            state.presence.route_to(recipient_id, event.clone());
            state.presence.route_to(&view.message.sender_id, event);
        }
        MessageTarget::Room { room_id } => {
            // The author sees the change even when not joined to the room.
            let author = state.presence.connection_for(&view.message.sender_id);
            state.presence.broadcast_room(room_id, &event, author);
            if let Some(conn) = author {
                state.presence.send_to_connection(conn, event);
            }
        }
    }
}

/// Mark the conversation with `counterpart_id` read for `reader_id` and let
/// the counterpart know.
pub async fn mark_read(state: &AppState, reader_id: &str, counterpart_id: &str) -> Result<u64> {
    let key = ConversationKey::new(reader_id, counterpart_id);
    let count = state.messages.mark_read(&key, reader_id).await?;

    if count > 0 {
        state.presence.route_to(
            counterpart_id,
            ServerEvent::MessagesRead {
                reader_id: reader_id.to_string(),
                count,
            },
        );
    }
    Ok(count)
}

/// Relay a typing indicator; nothing is stored.
pub fn typing(state: &AppState, user_id: &str, req: &TypingRequest) -> Result<()> {
    req.check()?;

    match (&req.to, &req.room) {
        (Some(to), _) => {
            state.presence.route_to(
                to.trim(),
                ServerEvent::UserTyping {
                    user_id: user_id.to_string(),
                    room: None,
                    is_typing: req.is_typing,
                },
            );
        }
        (None, Some(room)) => {
            let room = room.trim();
            state.presence.broadcast_room(
                room,
                &ServerEvent::UserTyping {
                    user_id: user_id.to_string(),
                    room: Some(room.to_string()),
                    is_typing: req.is_typing,
                },
                state.presence.connection_for(user_id),
            );
        }
        (None, None) => {}
    }
    Ok(())
}
