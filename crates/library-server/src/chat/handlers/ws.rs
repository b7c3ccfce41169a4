//! Websocket gateway
//!
//! One socket per signed-in user. Outgoing events come from the presence
//! registry's channel; incoming frames are parsed as [`ClientEvent`]s and
//! handled through the same dispatch path as the REST endpoints.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::chat::dispatch;
use crate::chat::events::{ClientEvent, ServerEvent};
use crate::chat::presence::{ConnectionId, EventReceiver};
use crate::chat::requests::check_room;
use crate::core::error::FieldErrors;
use crate::core::models::PresenceStatus;
use crate::core::{AppState, Ctx, Result};

/// GET /api/chat/ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ctx: Ctx,
) -> impl IntoResponse {
    info!("GET /api/chat/ws - {}", ctx.user_id());
    let user_id = ctx.user_id().to_string();
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: String) {
    let (conn, mut events) = open_session(&state, &user_id).await;

    let (mut sink, mut stream) = socket.split();

    // Ends when the registry drops our sender (unregister or displacement)
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("[Presence] Failed to encode event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let recv_state = state.clone();
    let recv_user = user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                Message::Text(text) => {
                    handle_frame(&recv_state, conn, &recv_user, text.as_str()).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    close_session(&state, conn, &user_id).await;
}

/// Register a connection for `user_id` and store the user as online
async fn open_session(state: &AppState, user_id: &str) -> (ConnectionId, EventReceiver) {
    let (conn, events) = state.presence.connect(user_id);
    store_status(state, user_id, PresenceStatus::Online).await;
    (conn, events)
}

/// Drop a connection. A displaced connection leaves the user's newer entry
/// and stored status in place.
async fn close_session(state: &AppState, conn: ConnectionId, user_id: &str) {
    if state.presence.unregister(conn).is_none() {
        debug!("[Presence] Connection {} of {} closed after displacement", conn, user_id);
        return;
    }
    mark_offline(state, user_id).await;
}

/// Store the user as offline unless a newer socket is live. The recheck
/// after the write covers a socket that registered while it was in flight.
async fn mark_offline(state: &AppState, user_id: &str) {
    if state.presence.is_online(user_id) {
        return;
    }
    store_status(state, user_id, PresenceStatus::Offline).await;
    if state.presence.is_online(user_id) {
        store_status(state, user_id, PresenceStatus::Online).await;
    }
}

async fn store_status(state: &AppState, user_id: &str, status: PresenceStatus) {
    if let Err(e) = state.auth.set_status(user_id, status).await {
        warn!("[Presence] Failed to mark {} {:?}: {}", user_id, status, e);
    }
}

async fn handle_frame(state: &AppState, conn: ConnectionId, user_id: &str, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            debug!("[Presence] Bad frame from {}: {}", user_id, e);
            state.presence.send_to_connection(
                conn,
                ServerEvent::Error {
                    message: format!("Invalid event: {}", e),
                },
            );
            return;
        }
    };

    if let Err(e) = handle_event(state, conn, user_id, event).await {
        state.presence.send_to_connection(
            conn,
            ServerEvent::Error {
                message: e.client_message(),
            },
        );
    }
}

async fn handle_event(
    state: &AppState,
    conn: ConnectionId,
    user_id: &str,
    event: ClientEvent,
) -> Result<()> {
    match event {
        ClientEvent::Join { room } => {
            let room = checked_room(&room)?;
            state.presence.join_room(conn, &room);
            state
                .presence
                .send_to_connection(conn, ServerEvent::Joined { room });
        }
        ClientEvent::Leave { room } => {
            let room = room.trim().to_string();
            state.presence.leave_room(conn, &room);
            state
                .presence
                .send_to_connection(conn, ServerEvent::Left { room });
        }
        ClientEvent::SendMessage(req) => {
            dispatch::send_message(state, user_id, req).await?;
        }
        ClientEvent::Typing(req) => {
            dispatch::typing(state, user_id, &req)?;
        }
        ClientEvent::MarkRead { with } => {
            dispatch::mark_read(state, user_id, with.trim()).await?;
        }
    }
    Ok(())
}

fn checked_room(room: &str) -> Result<String> {
    let mut errors = FieldErrors::new();
    check_room(&mut errors, room);
    errors.into_result()?;
    Ok(room.trim().to_string())
}
