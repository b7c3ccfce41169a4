//! Centralized directory structure management for the Student Library
//!
//! Directory layout:
//! ```text
//! library_data/
//! ├── local/           # SQLite database, config files
//! └── logs/            # Optional log output
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable that overrides the data root
pub const ROOT_ENV: &str = "LIBRARY_ROOT";

/// Name of the SQLite database file inside `local/`
pub const DB_FILE_NAME: &str = "library.sqlite";

#[derive(Serialize, Deserialize, Debug, Default)]
struct LibraryConfig {
    library_root: Option<PathBuf>,
}

/// Get the global configuration path
fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("student-library").join("config.json"))
}

/// Load the persistent root from the global config file
pub fn load_persistent_root() -> Option<PathBuf> {
    read_root_config(&config_path()?)
}

fn read_root_config(path: &Path) -> Option<PathBuf> {
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<LibraryConfig>(&content) {
            Ok(config) => config.library_root,
            Err(e) => {
                warn!("Failed to parse config file at {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            warn!("Failed to read config file at {:?}: {}", path, e);
            None
        }
    }
}

/// Get the data root from the environment, persistent config, the platform
/// data dir, or a relative default
pub fn library_root() -> PathBuf {
    // 1. Check environment variable
    if let Ok(val) = std::env::var(ROOT_ENV) {
        if !val.trim().is_empty() {
            return PathBuf::from(val);
        }
    }

    // 2. Check persistent config
    if let Some(root) = load_persistent_root() {
        return root;
    }

    // 3. Platform data directory
    if let Some(dir) = dirs::data_local_dir() {
        return dir.join("student-library");
    }

    // 4. Default fallback
    PathBuf::from("library_data")
}

/// Local data directory (SQLite, config)
pub fn local_dir_in(root: &Path) -> PathBuf {
    root.join("local")
}

/// Log directory
pub fn logs_dir_in(root: &Path) -> PathBuf {
    root.join("logs")
}

/// Database file path under a given root
pub fn db_path_in(root: &Path) -> PathBuf {
    local_dir_in(root).join(DB_FILE_NAME)
}

/// SQLite connection URL for a database file
pub fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy().replace('\\', "/"))
}

/// Ensure a single directory exists
pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created directory: {:?}", path);
    }
    Ok(())
}

/// Initialize the complete directory structure under `root`.
/// Call this once at startup before opening the database.
pub fn init_structure(root: &Path) -> anyhow::Result<PathBuf> {
    ensure_dir(root)?;
    ensure_dir(&local_dir_in(root))?;
    ensure_dir(&logs_dir_in(root))?;

    let canonical = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    info!("Library directory structure initialized at: {:?}", canonical);

    Ok(canonical)
}
