//! Admin handlers, layered behind `mw_require_admin`

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::users::UserQuery;
use crate::core::error::{Error, FieldErrors};
use crate::core::models::{AdminStats, Role, UserInfo};
use crate::core::validate::{ValidJson, ValidQuery, Validate};
use crate::core::{AppState, Ctx, Result};

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default = "default_verified")]
    pub verified: bool,
}

fn default_verified() -> bool {
    true
}

impl Validate for RoleRequest {
    fn validate(&self, _errors: &mut FieldErrors) {}
}

impl Validate for VerifyRequest {
    fn validate(&self, _errors: &mut FieldErrors) {}
}

/// GET /api/admin/users
pub async fn list_all_users(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<UserQuery>,
) -> Result<Json<Vec<UserInfo>>> {
    info!("GET /api/admin/users");
    let users = state.auth.list_users(query.search.as_deref(), true).await?;
    Ok(Json(users.into_iter().map(UserInfo::from).collect()))
}

/// PUT /api/admin/users/{id}/role
pub async fn set_role(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(user_id): Path<String>,
    ValidJson(req): ValidJson<RoleRequest>,
) -> Result<Json<UserInfo>> {
    info!("PUT /api/admin/users/{}/role - {:?}", user_id, req.role);

    if user_id == ctx.user_id() && req.role != Role::Admin {
        return Err(Error::BadRequest("Admins cannot demote themselves".to_string()));
    }
    let user = state.auth.set_role(&user_id, req.role).await?;
    Ok(Json(user.into()))
}

/// PUT /api/admin/users/{id}/verify
pub async fn set_verified(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ValidJson(req): ValidJson<VerifyRequest>,
) -> Result<Json<UserInfo>> {
    info!("PUT /api/admin/users/{}/verify - {}", user_id, req.verified);

    let user = state.auth.set_verified(&user_id, req.verified).await?;
    Ok(Json(user.into()))
}

/// POST /api/admin/users/{id}/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(user_id): Path<String>,
) -> Result<Json<UserInfo>> {
    info!("POST /api/admin/users/{}/deactivate", user_id);

    if user_id == ctx.user_id() {
        return Err(Error::BadRequest("Admins cannot deactivate themselves".to_string()));
    }
    let user = state.auth.set_active(&user_id, false).await?;

    // Drop the live socket too; its sessions are already gone.
    if let Some(conn) = state.presence.connection_for(&user_id) {
        state.presence.unregister(conn);
    }
    Ok(Json(user.into()))
}

/// POST /api/admin/users/{id}/reactivate
pub async fn reactivate(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserInfo>> {
    info!("POST /api/admin/users/{}/reactivate", user_id);

    let user = state.auth.set_active(&user_id, true).await?;
    Ok(Json(user.into()))
}

/// GET /api/admin/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<AdminStats>> {
    let (users, active_users, admins, verified_users) = state.auth.user_counts().await?;
    let (books, videos) = state.catalog.counts().await?;

    Ok(Json(AdminStats {
        users,
        active_users,
        admins,
        verified_users,
        online_users: state.presence.online_count(),
        messages: state.messages.count().await?,
        books,
        videos,
    }))
}
