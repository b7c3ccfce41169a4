//! Authentication Module
//!
//! Handles user signup, login, session management and the user directory.
//! Users and sessions live in the shared SQLite database; session tokens are
//! stored as sha256 digests, and logged-out tokens are kept in an in-memory
//! blacklist until the session they belonged to would have expired.

pub mod handlers;
pub mod middleware;

use bcrypt::{hash, verify};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::{Error, Result};
use crate::core::models::{PresenceStatus, Role, Session, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_verified, status, \
     avatar_url, bio, is_active, last_seen, created_at, updated_at";

/// Validated signup fields
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Profile fields a user may change; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedSession {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Auth manager handles all authentication and user records
pub struct AuthManager {
    pool: SqlitePool,
    session_ttl: Duration,
    bcrypt_cost: u32,
    /// In-memory session cache, keyed by token digest
    sessions: RwLock<HashMap<String, CachedSession>>,
    /// Token digests invalidated by logout, with their original expiry
    revoked: RwLock<HashMap<String, DateTime<Utc>>>,
}

fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthManager {
    /// Create new auth manager
    pub async fn new(pool: SqlitePool, session_ttl_days: i64, bcrypt_cost: u32) -> Result<Self> {
        let manager = Self {
            pool,
            session_ttl: Duration::days(session_ttl_days),
            bcrypt_cost,
            sessions: RwLock::new(HashMap::new()),
            revoked: RwLock::new(HashMap::new()),
        };

        manager.init_db().await?;
        info!("[Auth] Initialized");

        Ok(manager)
    }

    /// Create users and sessions tables
    async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                is_verified INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'offline',
                avatar_url TEXT,
                bio TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                last_seen TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Register a new user
    pub async fn signup(&self, new_user: NewUser) -> Result<User> {
        let email = normalize_email(&new_user.email);

        // Fast path; the UNIQUE constraint on insert is authoritative
        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        if existing.is_some() {
            return Err(Error::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash(&new_user.password, self.bcrypt_cost)?;
        let now = Utc::now();

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: new_user.name.trim().to_string(),
            email,
            password_hash,
            role: Role::User,
            is_verified: false,
            status: PresenceStatus::Offline,
            avatar_url: None,
            bio: None,
            is_active: true,
            last_seen: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, is_verified, status, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_verified)
        .bind(user.status)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Conflict("Email already registered".to_string())
            }
            e => Error::from(e),
        })?;

        info!("[Auth] User registered: {} ({})", user.name, user.email);

        Ok(user)
    }

    /// Login user and create session
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, Session)> {
        let email = normalize_email(email);

        let user: Option<User> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
                .bind(&email)
                .fetch_optional(&self.pool)
                .await?;

        let Some(mut user) = user else {
            warn!("[Auth] Login attempt for unknown email {}", email);
            return Err(Error::LoginFail);
        };

        if !verify(password, &user.password_hash)? {
            warn!("[Auth] Failed login attempt for {}", email);
            return Err(Error::LoginFail);
        }

        if !user.is_active {
            warn!("[Auth] Login attempt for deactivated account {}", email);
            return Err(Error::Forbidden("Account is deactivated".to_string()));
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_seen = ? WHERE id = ?")
            .bind(now)
            .bind(&user.id)
            .execute(&self.pool)
            .await?;
        user.last_seen = Some(now);

        let session = self.create_session(&user.id).await?;

        info!("[Auth] User logged in: {}", user.name);

        Ok((user, session))
    }

    /// Create new session for a user
    pub async fn create_session(&self, user_id: &str) -> Result<Session> {
        self.prune_expired().await?;

        let now = Utc::now();
        let session = Session {
            token: Uuid::new_v4().simple().to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        let digest = token_digest(&session.token);

        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&digest)
        .bind(&session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;

        self.sessions.write().await.insert(
            digest,
            CachedSession {
                user_id: session.user_id.clone(),
                expires_at: session.expires_at,
            },
        );

        Ok(session)
    }

    /// Validate session token and return the owning user
    pub async fn validate_session(&self, token: &str) -> Result<User> {
        let digest = token_digest(token);

        if self.revoked.read().await.contains_key(&digest) {
            return Err(Error::AuthFailInvalidToken);
        }

        let cached = self.sessions.read().await.get(&digest).cloned();
        let session = match cached {
            Some(session) => session,
            None => {
                let row: Option<(String, DateTime<Utc>)> = sqlx::query_as(
                    "SELECT user_id, expires_at FROM sessions WHERE token_hash = ?",
                )
                .bind(&digest)
                .fetch_optional(&self.pool)
                .await?;

                let (user_id, expires_at) = row.ok_or(Error::AuthFailInvalidToken)?;
                let session = CachedSession { user_id, expires_at };
                self.sessions
                    .write()
                    .await
                    .insert(digest.clone(), session.clone());
                session
            }
        };

        if session.expires_at <= Utc::now() {
            self.drop_session(&digest).await?;
            return Err(Error::AuthFailInvalidToken);
        }

        let user = self
            .find_user(&session.user_id)
            .await?
            .ok_or(Error::AuthFailInvalidToken)?;

        if !user.is_active {
            return Err(Error::Forbidden("Account is deactivated".to_string()));
        }

        Ok(user)
    }

    /// Logout user (invalidate session and blacklist the token)
    pub async fn logout(&self, token: &str) -> Result<()> {
        let digest = token_digest(token);
        let expires_at = self.session_expiry(&digest).await?;
        self.drop_session(&digest).await?;
        self.revoked.write().await.insert(digest, expires_at);

        info!("[Auth] Session invalidated");
        Ok(())
    }

    /// Whether a token was explicitly logged out
    pub async fn is_revoked(&self, token: &str) -> bool {
        self.revoked.read().await.contains_key(&token_digest(token))
    }

    /// Expiry of a known session; unknown tokens are blacklisted for a full TTL
    async fn session_expiry(&self, digest: &str) -> Result<DateTime<Utc>> {
        if let Some(cached) = self.sessions.read().await.get(digest) {
            return Ok(cached.expires_at);
        }
        let row: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT expires_at FROM sessions WHERE token_hash = ?")
                .bind(digest)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map_or_else(|| Utc::now() + self.session_ttl, |(expires_at,)| expires_at))
    }

    /// Forget expired sessions and blacklist entries; returns the number of
    /// session rows deleted
    pub async fn prune_expired(&self) -> Result<u64> {
        let now = Utc::now();
        self.sessions
            .write()
            .await
            .retain(|_, session| session.expires_at > now);
        self.revoked
            .write()
            .await
            .retain(|_, expires_at| *expires_at > now);

        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        let pruned = result.rows_affected();
        if pruned > 0 {
            debug!("[Auth] Pruned {} expired sessions", pruned);
        }
        Ok(pruned)
    }

    async fn drop_session(&self, digest: &str) -> Result<()> {
        self.sessions.write().await.remove(digest);
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(digest)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn drop_sessions_for_user(&self, user_id: &str) -> Result<()> {
        self.sessions
            .write()
            .await
            .retain(|_, session| session.user_id != user_id);
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Get user by ID, active or not
    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        self.find_user(user_id).await?.ok_or(Error::NotFound("User"))
    }

    /// Get user by ID, treating deactivated accounts as missing
    pub async fn get_active_user(&self, user_id: &str) -> Result<User> {
        match self.find_user(user_id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(Error::NotFound("User")),
        }
    }

    /// List users, optionally filtered by a name/email substring
    pub async fn list_users(&self, search: Option<&str>, include_inactive: bool) -> Result<Vec<User>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let users = sqlx::query_as(&format!(
            "SELECT {} FROM users \
             WHERE (? = 1 OR is_active = 1) \
             AND (? IS NULL OR lower(name) LIKE ? OR email LIKE ?) \
             ORDER BY name COLLATE NOCASE, created_at",
            USER_COLUMNS
        ))
        .bind(include_inactive)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Update user profile
    pub async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<User> {
        let mut user = self.get_active_user(user_id).await?;

        if let Some(name) = update.name {
            user.name = name.trim().to_string();
        }
        if let Some(bio) = update.bio {
            user.bio = Some(bio).filter(|b| !b.trim().is_empty());
        }
        if let Some(avatar_url) = update.avatar_url {
            user.avatar_url = Some(avatar_url).filter(|a| !a.trim().is_empty());
        }
        if let Some(password) = update.password {
            user.password_hash = hash(&password, self.bcrypt_cost)?;
        }
        user.updated_at = Utc::now();

        sqlx::query(
            "UPDATE users SET name = ?, bio = ?, avatar_url = ?, password_hash = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.bio)
        .bind(&user.avatar_url)
        .bind(&user.password_hash)
        .bind(user.updated_at)
        .bind(&user.id)
        .execute(&self.pool)
        .await?;

        info!("[Auth] Profile updated: {}", user.id);
        Ok(user)
    }

    /// Record a presence status change; going offline stamps last_seen
    pub async fn set_status(&self, user_id: &str, status: PresenceStatus) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE users SET status = ?, last_seen = CASE WHEN ? = 'offline' THEN ? ELSE last_seen END WHERE id = ?",
        )
        .bind(status)
        .bind(status)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("User"));
        }
        Ok(())
    }

    pub async fn set_role(&self, user_id: &str, role: Role) -> Result<User> {
        self.update_flag(user_id, "role", role).await?;
        info!("[Auth] Role of {} set to {:?}", user_id, role);
        self.get_user(user_id).await
    }

    pub async fn set_verified(&self, user_id: &str, verified: bool) -> Result<User> {
        self.update_flag(user_id, "is_verified", verified).await?;
        self.get_user(user_id).await
    }

    /// Soft-(de)activate an account; deactivation also ends its sessions
    pub async fn set_active(&self, user_id: &str, active: bool) -> Result<User> {
        self.update_flag(user_id, "is_active", active).await?;
        if !active {
            self.drop_sessions_for_user(user_id).await?;
            sqlx::query("UPDATE users SET status = 'offline' WHERE id = ?")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            info!("[Auth] User deactivated: {}", user_id);
        } else {
            info!("[Auth] User reactivated: {}", user_id);
        }
        self.get_user(user_id).await
    }

    async fn update_flag<T>(&self, user_id: &str, column: &'static str, value: T) -> Result<()>
    where
        T: for<'q> sqlx::Encode<'q, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite> + Send + 'static,
    {
        let sql = format!("UPDATE users SET {} = ?, updated_at = ? WHERE id = ?", column);
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("User"));
        }
        Ok(())
    }

    /// Promote an existing account to admin; returns false if no such email
    pub async fn promote_admin_by_email(&self, email: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET role = 'admin', updated_at = ? WHERE email = ?")
            .bind(Utc::now())
            .bind(normalize_email(email))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// (users, active, admins, verified)
    pub async fn user_counts(&self) -> Result<(i64, i64, i64, i64)> {
        let counts = sqlx::query_as(
            "SELECT COUNT(*), \
                    COALESCE(SUM(is_active), 0), \
                    COALESCE(SUM(CASE WHEN role = 'admin' THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(is_verified), 0) \
             FROM users",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db;

    async fn manager(ttl_days: i64) -> AuthManager {
        let pool = db::connect_in_memory().await.unwrap();
        AuthManager::new(pool, ttl_days, 4).await.unwrap()
    }

    async fn register(auth: &AuthManager) -> User {
        auth.signup(NewUser {
            name: "Linus".into(),
            email: "linus@uni.edu".into(),
            password: "password123".into(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_expired_sessions_are_pruned() {
        // Zero-day sessions are expired as soon as they are issued
        let auth = manager(0).await;
        let user = register(&auth).await;

        let first = auth.create_session(&user.id).await.unwrap();
        auth.logout(&first.token).await.unwrap();
        let second = auth.create_session(&user.id).await.unwrap();
        assert!(matches!(
            auth.validate_session(&second.token).await,
            Err(Error::AuthFailInvalidToken)
        ));

        auth.create_session(&user.id).await.unwrap();

        assert!(auth.revoked.read().await.is_empty());
        assert_eq!(auth.sessions.read().await.len(), 1);
        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(&auth.pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_logout_keeps_live_token_blacklisted() {
        let auth = manager(7).await;
        let user = register(&auth).await;

        let session = auth.create_session(&user.id).await.unwrap();
        auth.logout(&session.token).await.unwrap();
        assert!(auth.is_revoked(&session.token).await);

        // Pruning does not forget a token whose session is still in date
        auth.create_session(&user.id).await.unwrap();
        assert!(auth.is_revoked(&session.token).await);
        assert_eq!(
            auth.revoked.read().await.get(&token_digest(&session.token)),
            Some(&session.expires_at)
        );
    }
}
