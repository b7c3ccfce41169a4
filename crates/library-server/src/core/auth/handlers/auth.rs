//! Auth handlers

use crate::core::auth::middleware::token_from;
use crate::core::auth::NewUser;
use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::{FieldErrors, Result};
use crate::core::models::UserInfo;
use crate::core::validate::{check_email, is_blank, require_text, ValidJson, Validate};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_NAME_LEN: usize = 100;

pub fn check_password(errors: &mut FieldErrors, field: &str, password: &str) {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        errors.add(field, format!("must be at least {} characters", MIN_PASSWORD_LEN));
    } else if len > MAX_PASSWORD_LEN {
        errors.add(field, format!("must be at most {} characters", MAX_PASSWORD_LEN));
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Validate for SignupRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        require_text(errors, "name", &self.name, MAX_NAME_LEN);
        check_email(errors, "email", &self.email);
        check_password(errors, "password", &self.password);
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        if is_blank(&self.email) {
            errors.add("email", "is required");
        }
        if self.password.is_empty() {
            errors.add("password", "is required");
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    info!("POST /api/auth/signup - {}", req.email);

    let user = state
        .auth
        .signup(NewUser {
            name: req.name,
            email: req.email,
            password: req.password,
        })
        .await?;
    let session = state.auth.create_session(&user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: session.token,
            user: user.into(),
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    info!("POST /api/auth/login - {}", req.email);

    let (user, session) = state.auth.login(&req.email, &req.password).await?;

    Ok(Json(AuthResponse {
        token: session.token,
        user: user.into(),
    }))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    ctx: Ctx,
    headers: HeaderMap,
    uri: Uri,
) -> Result<StatusCode> {
    info!("POST /api/auth/logout - {}", ctx.user_id());

    let token = token_from(&headers, &uri)?;
    state.auth.logout(&token).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, ctx: Ctx) -> Result<Json<UserInfo>> {
    let user = state.auth.get_user(ctx.user_id()).await?;

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_validation() {
        let req = SignupRequest {
            name: " ".into(),
            email: "not-an-email".into(),
            password: "123".into(),
        };
        let mut errors = FieldErrors::new();
        req.validate(&mut errors);
        assert!(errors.get("name").is_some());
        assert!(errors.get("email").is_some());
        assert!(errors.get("password").is_some());

        let req = SignupRequest {
            name: "Ada".into(),
            email: "ada@uni.edu".into(),
            password: "123456".into(),
        };
        assert!(req.check().is_ok());
    }
}
