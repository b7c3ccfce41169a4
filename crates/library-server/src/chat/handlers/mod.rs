//! Chat Handlers and Router
//!
//! Direct messages, room history and the websocket gateway. Every route
//! here sits behind the auth middleware.

use crate::core::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub mod messages;
pub mod rooms;
pub mod ws;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", post(messages::send_message))
        .route("/messages/conversations", get(messages::list_conversations))
        .route("/messages/unread", get(messages::unread_count))
        .route("/messages/with/{user_id}", get(messages::conversation_history))
        .route("/messages/with/{user_id}/read", post(messages::mark_read))
        .route(
            "/messages/{message_id}",
            get(messages::get_message)
                .put(messages::edit_message)
                .delete(messages::delete_message),
        )
        .route("/chat/rooms/{room}/messages", get(rooms::room_history))
        .route("/chat/ws", get(ws::ws_handler))
}
