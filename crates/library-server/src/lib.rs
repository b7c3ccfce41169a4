//! Student Library Server Library
//!
//! REST API for accounts, the book and video catalog and messaging, plus a
//! websocket gateway for real-time delivery and presence.

pub mod catalog;
pub mod chat;
pub mod core;

use axum::{middleware, routing::get, Router};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::core::auth::middleware::{mw_require_admin, mw_require_auth};
use crate::core::{db, error, AppState, ServerConfig};

/// Build the full application router around `state`
pub fn app(state: AppState) -> Router {
    let admin = crate::core::router::admin_router().route_layer(middleware::from_fn(mw_require_admin));

    // Admin checks run inside the auth layer, after the session is resolved
    let protected = Router::new()
        .merge(crate::core::router())
        .merge(catalog::router())
        .merge(chat::router())
        .nest("/admin", admin)
        .route_layer(middleware::from_fn_with_state(state.clone(), mw_require_auth));

    let api = crate::core::router::public_router().merge(protected);

    Router::new()
        .nest("/api", api)
        .route("/health", get(health_check))
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        // Already set, ignore
    }

    info!("=== Student Library Server ===");

    let config = ServerConfig::from_env();
    config.ensure_dirs()?;
    error::set_expose_internal_errors(!config.production);

    info!("Data directory: {:?}", config.data_dir);
    info!("Database: {}", config.database_url);
    if config.production {
        info!("Running in production mode");
    }

    let pool = db::connect(&config.database_url).await?;
    let bind_addr = config.bind_addr;
    let admin_email = config.admin_email.clone();

    let state = AppState::new(config, pool).await?;

    if let Some(email) = admin_email {
        if state.auth.promote_admin_by_email(&email).await? {
            info!("[Auth] {} promoted to admin", email);
        } else {
            warn!("[Auth] Admin email {} has no account yet", email);
        }
    }

    let app = app(state);

    info!("Listening on http://{}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK - Student Library Server"
}
