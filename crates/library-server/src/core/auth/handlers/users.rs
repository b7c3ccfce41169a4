//! User directory handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::auth::{check_password, MAX_NAME_LEN};
use crate::core::auth::ProfileUpdate;
use crate::core::error::FieldErrors;
use crate::core::models::{PresenceStatus, UserInfo};
use crate::core::validate::{check_search, check_url, optional_text, ValidJson, ValidQuery, Validate};
use crate::core::{AppState, Ctx, Result};

pub const MAX_BIO_LEN: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    #[serde(alias = "q")]
    pub search: Option<String>,
}

impl Validate for UserQuery {
    fn validate(&self, errors: &mut FieldErrors) {
        check_search(errors, self.search.as_deref());
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub password: Option<String>,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        optional_text(errors, "name", self.name.as_deref(), MAX_NAME_LEN);
        if self.bio.as_deref().is_some_and(|b| b.chars().count() > MAX_BIO_LEN) {
            errors.add("bio", format!("must be at most {} characters", MAX_BIO_LEN));
        }
        check_url(
            errors,
            "avatar_url",
            self.avatar_url.as_deref().filter(|a| !a.trim().is_empty()),
        );
        if let Some(password) = &self.password {
            check_password(errors, "password", password);
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: PresenceStatus,
}

// The enum already restricts the value; a bad variant is a 400 from the extractor.
impl Validate for StatusRequest {
    fn validate(&self, _errors: &mut FieldErrors) {}
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<UserQuery>,
) -> Result<Json<Vec<UserInfo>>> {
    info!("GET /api/users");
    let users = state.auth.list_users(query.search.as_deref(), false).await?;
    Ok(Json(users.into_iter().map(UserInfo::from).collect()))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(user_id): Path<String>,
) -> Result<Json<UserInfo>> {
    let user = if ctx.is_admin() {
        state.auth.get_user(&user_id).await?
    } else {
        state.auth.get_active_user(&user_id).await?
    };
    Ok(Json(user.into()))
}

/// PUT /api/users/me
pub async fn update_me(
    State(state): State<AppState>,
    ctx: Ctx,
    ValidJson(req): ValidJson<UpdateProfileRequest>,
) -> Result<Json<UserInfo>> {
    info!("PUT /api/users/me - {}", ctx.user_id());

    let user = state
        .auth
        .update_profile(
            ctx.user_id(),
            ProfileUpdate {
                name: req.name,
                bio: req.bio,
                avatar_url: req.avatar_url,
                password: req.password,
            },
        )
        .await?;
    Ok(Json(user.into()))
}

/// PUT /api/users/me/status
pub async fn update_status(
    State(state): State<AppState>,
    ctx: Ctx,
    ValidJson(req): ValidJson<StatusRequest>,
) -> Result<Json<UserInfo>> {
    info!("PUT /api/users/me/status - {} is {:?}", ctx.user_id(), req.status);

    state.auth.set_status(ctx.user_id(), req.status).await?;
    let user = state.auth.get_user(ctx.user_id()).await?;
    Ok(Json(user.into()))
}

/// GET /api/users/online
pub async fn online_users(State(state): State<AppState>) -> Json<Value> {
    let online = state.presence.online_users();
    Json(json!({ "count": online.len(), "users": online }))
}
