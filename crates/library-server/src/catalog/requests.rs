//! Catalog request bodies
//!
//! Creates carry every field; updates are partial and leave `None` fields
//! untouched. An empty string clears an optional field.

use serde::Deserialize;

use crate::core::error::FieldErrors;
use crate::core::validate::{check_search, check_url, optional_text, require_text, Validate};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_TEXT_LEN: usize = 5000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub isbn: Option<String>,
    pub cover_url: Option<String>,
    pub file_url: Option<String>,
}

impl Validate for NewBook {
    fn validate(&self, errors: &mut FieldErrors) {
        require_text(errors, "title", &self.title, MAX_TITLE_LEN);
        check_description(errors, self.description.as_deref());
        check_url(errors, "cover_url", non_empty(&self.cover_url));
        check_url(errors, "file_url", non_empty(&self.file_url));
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub isbn: Option<String>,
    pub cover_url: Option<String>,
    pub file_url: Option<String>,
}

impl Validate for BookUpdate {
    fn validate(&self, errors: &mut FieldErrors) {
        optional_text(errors, "title", self.title.as_deref(), MAX_TITLE_LEN);
        check_description(errors, self.description.as_deref());
        check_url(errors, "cover_url", non_empty(&self.cover_url));
        check_url(errors, "file_url", non_empty(&self.file_url));
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewVideo {
    pub title: String,
    pub creator: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
    pub duration_secs: Option<i64>,
}

impl Validate for NewVideo {
    fn validate(&self, errors: &mut FieldErrors) {
        require_text(errors, "title", &self.title, MAX_TITLE_LEN);
        check_description(errors, self.description.as_deref());
        check_url(errors, "thumbnail_url", non_empty(&self.thumbnail_url));
        check_url(errors, "video_url", non_empty(&self.video_url));
        check_duration(errors, self.duration_secs);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoUpdate {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
    pub duration_secs: Option<i64>,
}

impl Validate for VideoUpdate {
    fn validate(&self, errors: &mut FieldErrors) {
        optional_text(errors, "title", self.title.as_deref(), MAX_TITLE_LEN);
        check_description(errors, self.description.as_deref());
        check_url(errors, "thumbnail_url", non_empty(&self.thumbnail_url));
        check_url(errors, "video_url", non_empty(&self.video_url));
        check_duration(errors, self.duration_secs);
    }
}

/// `?search=&category=` filters for list endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogQuery {
    #[serde(alias = "q")]
    pub search: Option<String>,
    pub category: Option<String>,
}

impl Validate for CatalogQuery {
    fn validate(&self, errors: &mut FieldErrors) {
        check_search(errors, self.search.as_deref());
        optional_text(errors, "category", non_empty(&self.category), MAX_TITLE_LEN);
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn check_description(errors: &mut FieldErrors, value: Option<&str>) {
    if value.is_some_and(|v| v.chars().count() > MAX_TEXT_LEN) {
        errors.add("description", format!("must be at most {} characters", MAX_TEXT_LEN));
    }
}

fn check_duration(errors: &mut FieldErrors, value: Option<i64>) {
    if value.is_some_and(|d| d < 0) {
        errors.add("duration_secs", "must not be negative");
    }
}
