use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::chat::models::MessageView;
use crate::chat::requests::{check_room, HistoryQuery};
use crate::core::error::FieldErrors;
use crate::core::validate::ValidQuery;
use crate::core::{AppState, Result};

/// GET /api/chat/rooms/{room}/messages
pub async fn room_history(
    State(state): State<AppState>,
    Path(room): Path<String>,
    ValidQuery(query): ValidQuery<HistoryQuery>,
) -> Result<Json<Vec<MessageView>>> {
    info!("GET /api/chat/rooms/{}/messages", room);

    let mut errors = FieldErrors::new();
    check_room(&mut errors, &room);
    errors.into_result()?;

    let history = state
        .messages
        .room_history(room.trim(), query.before, query.limit())
        .await?;
    Ok(Json(history))
}
