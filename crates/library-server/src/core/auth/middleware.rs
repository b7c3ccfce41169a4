use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::{Error, Result};
use axum::{
    extract::{Request, State},
    http::{header, request::Parts, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Bearer token from the Authorization header, or `?token=` for websocket upgrades
pub fn extract_token(parts: &Parts) -> Result<String> {
    token_from(&parts.headers, &parts.uri)
}

pub fn token_from(headers: &HeaderMap, uri: &Uri) -> Result<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_header = auth_header
            .to_str()
            .map_err(|_| Error::AuthFailTokenWrongFormat)?;

        // Format: "Bearer <token>"
        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(Error::AuthFailTokenWrongFormat)?;
        return Ok(token.to_string());
    }

    uri.query()
        .and_then(|query| {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, value)| *key == "token" && !value.is_empty())
                .map(|(_, value)| value.to_string())
        })
        .ok_or(Error::AuthFailNoToken)
}

pub async fn mw_require_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response> {
    debug!("MIDDLEWARE: require_auth");

    let (mut parts, body) = req.into_parts();
    let token = extract_token(&parts)?;

    let user = state.auth.validate_session(&token).await?;

    parts.extensions.insert(Ctx::new(user.id, user.role));

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Must be layered inside `mw_require_auth`
pub async fn mw_require_admin(ctx: Ctx, req: Request, next: Next) -> Result<Response> {
    debug!("MIDDLEWARE: require_admin");

    ctx.require_admin()?;
    Ok(next.run(req).await)
}
