//! Core Service Layer
//!
//! Shared infrastructure for the library server: authentication, data
//! models, configuration, validation and storage.

pub mod auth;
pub mod config;
pub mod ctx;
pub mod db;
pub mod error;
pub mod models;
pub mod router;
pub mod validate;

// Re-exports for convenience
pub use config::{AppState, ServerConfig};
pub use ctx::Ctx;
pub use error::{Error, Result};
pub use router::router;
