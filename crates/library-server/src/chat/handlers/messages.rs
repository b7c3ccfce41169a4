//! Direct message endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::chat::dispatch;
use crate::chat::models::{ConversationKey, ConversationSummary, MessageView};
use crate::chat::requests::{EditMessageRequest, HistoryQuery, SendMessageRequest};
use crate::core::validate::{ValidJson, ValidQuery};
use crate::core::{AppState, Ctx, Error, Result};

/// POST /api/messages
pub async fn send_message(
    State(state): State<AppState>,
    ctx: Ctx,
    ValidJson(req): ValidJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>)> {
    info!("POST /api/messages - from {}", ctx.user_id());

    let view = dispatch::send_message(&state, ctx.user_id(), req).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/messages/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<Json<Vec<ConversationSummary>>> {
    info!("GET /api/messages/conversations - {}", ctx.user_id());

    let conversations = state.messages.list_conversations(ctx.user_id()).await?;
    Ok(Json(conversations))
}

/// GET /api/messages/unread
pub async fn unread_count(State(state): State<AppState>, ctx: Ctx) -> Result<Json<Value>> {
    let count = state.messages.unread_count(ctx.user_id()).await?;
    Ok(Json(json!({ "unread": count })))
}

/// GET /api/messages/with/{user_id}
pub async fn conversation_history(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(user_id): Path<String>,
    ValidQuery(query): ValidQuery<HistoryQuery>,
) -> Result<Json<Vec<MessageView>>> {
    info!("GET /api/messages/with/{} - {}", user_id, ctx.user_id());

    // 404 for ids that never existed rather than an empty history
    state.auth.get_user(&user_id).await?;

    let key = ConversationKey::new(ctx.user_id(), user_id.as_str());
    let history = state
        .messages
        .conversation_history(&key, ctx.user_id(), query.before, query.limit())
        .await?;
    Ok(Json(history))
}

/// POST /api/messages/with/{user_id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(user_id): Path<String>,
) -> Result<Json<Value>> {
    info!("POST /api/messages/with/{}/read - {}", user_id, ctx.user_id());

    let count = dispatch::mark_read(&state, ctx.user_id(), &user_id).await?;
    Ok(Json(json!({ "marked_read": count })))
}

/// GET /api/messages/{message_id}
pub async fn get_message(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(message_id): Path<String>,
) -> Result<Json<MessageView>> {
    let view = state.messages.get(&message_id).await?;

    // Direct messages are visible to their two participants only
    if let Some(key) = view.message.conversation_key() {
        if !key.contains(ctx.user_id()) {
            return Err(Error::NotFound("Message"));
        }
    }
    Ok(Json(view))
}

/// PUT /api/messages/{message_id}
pub async fn edit_message(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(message_id): Path<String>,
    ValidJson(req): ValidJson<EditMessageRequest>,
) -> Result<Json<MessageView>> {
    info!("PUT /api/messages/{} - {}", message_id, ctx.user_id());

    let view = dispatch::edit_message(&state, ctx.user_id(), &message_id, req).await?;
    Ok(Json(view))
}

/// DELETE /api/messages/{message_id}
pub async fn delete_message(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(message_id): Path<String>,
) -> Result<Json<MessageView>> {
    info!("DELETE /api/messages/{} - {}", message_id, ctx.user_id());

    let view = dispatch::delete_message(&state, ctx.user_id(), &message_id).await?;
    Ok(Json(view))
}
