//! Typed request bodies, checked before they reach a handler.

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::core::error::{Error, FieldErrors, Result};

/// Implemented by request DTOs; records every offending field.
pub trait Validate {
    fn validate(&self, errors: &mut FieldErrors);

    fn check(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        self.validate(&mut errors);
        errors.into_result()
    }
}

/// JSON extractor that runs [`Validate`] after deserializing
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| Error::BadRequest(rejection.body_text()))?;
        value.check()?;
        Ok(Self(value))
    }
}

/// Query-string counterpart of [`ValidJson`]; malformed values are a 400
/// with the usual JSON error body instead of axum's plain-text rejection.
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| Error::BadRequest(rejection.body_text()))?;
        value.check()?;
        Ok(Self(value))
    }
}

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn require_text(errors: &mut FieldErrors, field: &str, value: &str, max_len: usize) {
    if is_blank(value) {
        errors.add(field, "is required");
    } else if value.chars().count() > max_len {
        errors.add(field, format!("must be at most {} characters", max_len));
    }
}

pub fn optional_text(errors: &mut FieldErrors, field: &str, value: Option<&str>, max_len: usize) {
    if let Some(value) = value {
        require_text(errors, field, value, max_len);
    }
}

pub const MAX_SEARCH_LEN: usize = 100;

pub fn check_search(errors: &mut FieldErrors, value: Option<&str>) {
    if value.is_some_and(|v| v.chars().count() > MAX_SEARCH_LEN) {
        errors.add("search", format!("must be at most {} characters", MAX_SEARCH_LEN));
    }
}

pub fn check_email(errors: &mut FieldErrors, field: &str, value: &str) {
    let value = value.trim();
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        errors.add(field, "must be a valid email address");
    }
}

pub fn check_url(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        if !(value.starts_with("http://") || value.starts_with("https://")) {
            errors.add(field, "must be an http(s) URL");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_check() {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, "ok", "student@uni.edu");
        assert!(errors.is_empty());

        check_email(&mut errors, "no_at", "student.uni.edu");
        check_email(&mut errors, "no_tld", "student@uni");
        check_email(&mut errors, "no_local", "@uni.edu");
        assert!(errors.get("no_at").is_some());
        assert!(errors.get("no_tld").is_some());
        assert!(errors.get("no_local").is_some());
    }

    #[test]
    fn test_require_text_limits() {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "blank", "   ", 10);
        require_text(&mut errors, "long", "abcdefghijk", 10);
        require_text(&mut errors, "fine", "abc", 10);
        assert_eq!(errors.get("blank"), Some("is required"));
        assert!(errors.get("long").is_some());
        assert!(errors.get("fine").is_none());
    }

    #[test]
    fn test_url_check() {
        let mut errors = FieldErrors::new();
        check_url(&mut errors, "a", Some("https://cdn.example.com/x.pdf"));
        check_url(&mut errors, "b", None);
        check_url(&mut errors, "c", Some("ftp://x"));
        assert!(errors.get("a").is_none());
        assert!(errors.get("b").is_none());
        assert!(errors.get("c").is_some());
    }
}
