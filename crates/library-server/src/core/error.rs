use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

/// When false, internal error messages are replaced by a generic string.
static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(true);

/// Toggle whether 500 responses carry the underlying message (off in production).
pub fn set_expose_internal_errors(expose: bool) {
    EXPOSE_INTERNAL_ERRORS.store(expose, Ordering::Relaxed);
}

/// Field name -> message, surfaced in 400 responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Input
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("{0}")]
    BadRequest(String),

    // Auth
    #[error("login failed")]
    LoginFail,
    #[error("no auth token found")]
    AuthFailNoToken,
    #[error("auth token wrong format")]
    AuthFailTokenWrongFormat,
    #[error("invalid or expired session")]
    AuthFailInvalidToken,
    #[error("auth context missing")]
    AuthFailCtxNotInRequestExt,
    #[error("{0}")]
    Forbidden(String),

    // Model
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),

    // Generic
    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Single-field validation error
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.add(field, message);
        Error::Validation(fields)
    }

    /// Message safe to show a client; internal details are elided in production
    pub fn client_message(&self) -> String {
        match self {
            Error::Validation(fields) => {
                let detail: Vec<String> =
                    fields.0.iter().map(|(field, msg)| format!("{}: {}", field, msg)).collect();
                format!("{}: {}", self, detail.join(", "))
            }
            Error::Internal(_) | Error::AuthFailCtxNotInRequestExt => {
                error!("Internal error: {}", self);
                if EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed) {
                    self.to_string()
                } else {
                    "Internal server error".to_string()
                }
            }
            _ => self.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::LoginFail
            | Error::AuthFailNoToken
            | Error::AuthFailTokenWrongFormat
            | Error::AuthFailInvalidToken => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::AuthFailCtxNotInRequestExt | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            Error::Validation(fields) => json!({
                "error": {
                    "message": self.to_string(),
                    "fields": fields,
                }
            }),
            _ => json!({ "error": { "message": self.client_message() } }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(format!("{:#}", err))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Internal(format!("database error: {}", err))
    }
}

impl From<bcrypt::BcryptError> for Error {
    fn from(err: bcrypt::BcryptError) -> Self {
        Error::Internal(format!("password hashing failed: {}", err))
    }
}
