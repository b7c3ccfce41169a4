//! Server configuration and shared state

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::catalog::CatalogManager;
use crate::chat::{MessageStore, PresenceRegistry};
use crate::core::auth::AuthManager;
use crate::core::error::Result;

/// Configuration for the Student Library server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Root directory for local data
    pub data_dir: PathBuf,
    /// SQLite connection URL
    pub database_url: String,
    /// Address the HTTP listener binds to
    pub bind_addr: SocketAddr,
    /// Session lifetime in days
    pub session_ttl_days: i64,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
    /// Production mode hides internal error messages
    pub production: bool,
    /// Account promoted to admin at startup, if it exists
    pub admin_email: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = library_common::library_root();
        Self {
            database_url: library_common::sqlite_url(&library_common::db_path_in(&data_dir)),
            data_dir,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            session_ttl_days: 7,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            production: false,
            admin_email: None,
        }
    }
}

impl ServerConfig {
    /// Create config with a custom base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let data_dir = base_dir.into();
        Self {
            database_url: library_common::sqlite_url(&library_common::db_path_in(&data_dir)),
            data_dir,
            ..Self::default()
        }
    }

    /// Defaults overridden by `LIBRARY_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("LIBRARY_DB_URL") {
            config.database_url = url;
        }
        if let Some(addr) = env_parse::<SocketAddr>("LIBRARY_BIND") {
            config.bind_addr = addr;
        }
        if let Some(days) = env_parse::<i64>("LIBRARY_SESSION_DAYS").filter(|d| *d > 0) {
            config.session_ttl_days = days;
        }
        if let Some(cost) = env_parse::<u32>("LIBRARY_BCRYPT_COST") {
            config.bcrypt_cost = cost.clamp(4, 31);
        }
        config.production = std::env::var("LIBRARY_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        config.admin_email = std::env::var("LIBRARY_ADMIN_EMAIL")
            .ok()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());

        config
    }

    /// Ensure all directories exist
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        library_common::init_structure(&self.data_dir)?;
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub auth: Arc<AuthManager>,
    pub messages: Arc<MessageStore>,
    pub catalog: Arc<CatalogManager>,
    pub presence: Arc<PresenceRegistry>,
}

impl AppState {
    /// Build every manager on top of one pool, creating tables as needed
    pub async fn new(config: ServerConfig, pool: SqlitePool) -> Result<Self> {
        let auth = Arc::new(
            AuthManager::new(pool.clone(), config.session_ttl_days, config.bcrypt_cost).await?,
        );
        let messages = Arc::new(MessageStore::new(pool.clone()).await?);
        let catalog = Arc::new(CatalogManager::new(pool).await?);

        Ok(Self {
            config: Arc::new(config),
            auth,
            messages,
            catalog,
            presence: Arc::new(PresenceRegistry::new()),
        })
    }
}
