//! Catalog handlers
//!
//! Reads are open to any signed-in user; writes take an [`AdminCtx`].

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::info;

use crate::catalog::models::{Book, Video};
use crate::catalog::requests::{BookUpdate, CatalogQuery, NewBook, NewVideo, VideoUpdate};
use crate::core::validate::{ValidJson, ValidQuery};
use crate::core::ctx::AdminCtx;
use crate::core::{AppState, Result};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route(
            "/books/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/videos", get(list_videos).post(create_video))
        .route(
            "/videos/{id}",
            get(get_video).put(update_video).delete(delete_video),
        )
}

/// GET /api/books
pub async fn list_books(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<CatalogQuery>,
) -> Result<Json<Vec<Book>>> {
    info!("GET /api/books");
    let books = state
        .catalog
        .list_books(query.search.as_deref(), query.category.as_deref())
        .await?;
    Ok(Json(books))
}

/// GET /api/books/{id}
pub async fn get_book(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Book>> {
    Ok(Json(state.catalog.get_book(&id).await?))
}

/// POST /api/books
pub async fn create_book(
    State(state): State<AppState>,
    AdminCtx(ctx): AdminCtx,
    ValidJson(req): ValidJson<NewBook>,
) -> Result<(StatusCode, Json<Book>)> {
    info!("POST /api/books - {}", req.title);
    let book = state.catalog.create_book(ctx.user_id(), req).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// PUT /api/books/{id}
pub async fn update_book(
    State(state): State<AppState>,
    _admin: AdminCtx,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<BookUpdate>,
) -> Result<Json<Book>> {
    info!("PUT /api/books/{}", id);
    Ok(Json(state.catalog.update_book(&id, req).await?))
}

/// DELETE /api/books/{id}
pub async fn delete_book(
    State(state): State<AppState>,
    _admin: AdminCtx,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    info!("DELETE /api/books/{}", id);
    state.catalog.delete_book(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/videos
pub async fn list_videos(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<CatalogQuery>,
) -> Result<Json<Vec<Video>>> {
    info!("GET /api/videos");
    let videos = state
        .catalog
        .list_videos(query.search.as_deref(), query.category.as_deref())
        .await?;
    Ok(Json(videos))
}

/// GET /api/videos/{id}
pub async fn get_video(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Video>> {
    Ok(Json(state.catalog.get_video(&id).await?))
}

/// POST /api/videos
pub async fn create_video(
    State(state): State<AppState>,
    AdminCtx(ctx): AdminCtx,
    ValidJson(req): ValidJson<NewVideo>,
) -> Result<(StatusCode, Json<Video>)> {
    info!("POST /api/videos - {}", req.title);
    let video = state.catalog.create_video(ctx.user_id(), req).await?;
    Ok((StatusCode::CREATED, Json(video)))
}

/// PUT /api/videos/{id}
pub async fn update_video(
    State(state): State<AppState>,
    _admin: AdminCtx,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<VideoUpdate>,
) -> Result<Json<Video>> {
    info!("PUT /api/videos/{}", id);
    Ok(Json(state.catalog.update_video(&id, req).await?))
}

/// DELETE /api/videos/{id}
pub async fn delete_video(
    State(state): State<AppState>,
    _admin: AdminCtx,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    info!("DELETE /api/videos/{}", id);
    state.catalog.delete_video(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
