use crate::core::error::{Error, Result};
use crate::core::models::Role;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Authenticated caller, inserted into request extensions by the auth middleware
#[derive(Clone, Debug)]
pub struct Ctx {
    user_id: String,
    role: Role,
}

impl Ctx {
    pub fn new(user_id: String, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden("Admin access required".to_string()))
        }
    }
}

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<Ctx>()
            .cloned()
            .ok_or(Error::AuthFailCtxNotInRequestExt)
    }
}

/// A [`Ctx`] that must belong to an admin. Being a parts extractor, it
/// rejects non-admins before any request body is read.
#[derive(Clone, Debug)]
pub struct AdminCtx(pub Ctx);

impl<S> FromRequestParts<S> for AdminCtx
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let ctx = Ctx::from_request_parts(parts, state).await?;
        ctx.require_admin()?;
        Ok(Self(ctx))
    }
}
