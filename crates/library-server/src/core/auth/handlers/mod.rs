//! Auth, user directory and admin handlers

pub mod admin;
pub mod auth;
pub mod users;

pub use auth::{login, logout, me, signup};
