//! Core Router
//!
//! Auth, user directory and admin routes. `lib.rs` decides which of these
//! sit behind the auth and admin middleware.

use crate::core::auth::handlers::{self as auth_handlers, admin, users};
use crate::core::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

/// Routes reachable without a session
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(auth_handlers::signup))
        .route("/auth/login", post(auth_handlers::login))
}

/// Routes for any signed-in user
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(auth_handlers::logout))
        .route("/auth/me", get(auth_handlers::me))
        .route("/users", get(users::list_users))
        .route("/users/online", get(users::online_users))
        .route("/users/me", get(auth_handlers::me).put(users::update_me))
        .route("/users/me/status", put(users::update_status))
        .route("/users/{user_id}", get(users::get_user))
}

/// Routes for admins; nested under `/admin`
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/users", get(admin::list_all_users))
        .route("/users/{user_id}/role", put(admin::set_role))
        .route("/users/{user_id}/verify", put(admin::set_verified))
        .route("/users/{user_id}/deactivate", post(admin::deactivate))
        .route("/users/{user_id}/reactivate", post(admin::reactivate))
        .route("/stats", get(admin::stats))
}
