#![allow(dead_code)]

use library_server::core::auth::NewUser;
use library_server::core::models::User;
use library_server::core::{db, AppState, ServerConfig};
use tempfile::{tempdir, TempDir};

/// Fresh server state backed by a database file in a temp dir.
/// Keep the returned `TempDir` alive for the duration of the test.
pub async fn setup() -> (TempDir, AppState) {
    let dir = tempdir().unwrap();
    let mut config = ServerConfig::with_base_dir(dir.path());
    config.bcrypt_cost = 4;
    config.ensure_dirs().unwrap();

    let pool = db::connect(&config.database_url).await.unwrap();
    let state = AppState::new(config, pool).await.unwrap();
    (dir, state)
}

pub async fn user(state: &AppState, name: &str) -> User {
    state
        .auth
        .signup(NewUser {
            name: name.to_string(),
            email: format!("{}@uni.edu", name.to_lowercase()),
            password: "password123".to_string(),
        })
        .await
        .unwrap()
}
