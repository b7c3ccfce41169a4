//! Catalog Module
//!
//! Books and videos shared with every signed-in student. Only admins
//! write; removal is a hard delete.

pub mod handlers;
pub mod models;
pub mod requests;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::core::error::{Error, Result};
use models::{Book, Video};
use requests::{BookUpdate, NewBook, NewVideo, VideoUpdate};

pub use handlers::router;

/// Trimmed value, or `None` when blank
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Apply a partial update: `None` keeps the current value, blank clears it
fn merge(current: &mut Option<String>, update: Option<String>) {
    if update.is_some() {
        *current = clean(update);
    }
}

fn like_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s))
}

pub struct CatalogManager {
    pool: SqlitePool,
}

impl CatalogManager {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let manager = Self { pool };
        manager.init_db().await?;
        info!("[Catalog] Initialized");
        Ok(manager)
    }

    async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT,
                description TEXT,
                category TEXT,
                isbn TEXT,
                cover_url TEXT,
                file_url TEXT,
                uploaded_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (uploaded_by) REFERENCES users(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS videos (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                creator TEXT,
                description TEXT,
                category TEXT,
                thumbnail_url TEXT,
                video_url TEXT,
                duration_secs INTEGER,
                uploaded_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (uploaded_by) REFERENCES users(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ========== Books ==========

    pub async fn create_book(&self, uploaded_by: &str, new: NewBook) -> Result<Book> {
        let now = Utc::now();
        let book = Book {
            id: Uuid::new_v4().to_string(),
            title: new.title.trim().to_string(),
            author: clean(new.author),
            description: clean(new.description),
            category: clean(new.category),
            isbn: clean(new.isbn),
            cover_url: clean(new.cover_url),
            file_url: clean(new.file_url),
            uploaded_by: uploaded_by.to_string(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO books (id, title, author, description, category, isbn, cover_url, file_url, \
             uploaded_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(&book.category)
        .bind(&book.isbn)
        .bind(&book.cover_url)
        .bind(&book.file_url)
        .bind(&book.uploaded_by)
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await?;

        info!("[Catalog] Book added: {} ({})", book.title, book.id);
        Ok(book)
    }

    pub async fn get_book(&self, id: &str) -> Result<Book> {
        sqlx::query_as("SELECT * FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound("Book"))
    }

    pub async fn list_books(&self, search: Option<&str>, category: Option<&str>) -> Result<Vec<Book>> {
        let pattern = like_pattern(search);
        let category = category.map(str::trim).filter(|c| !c.is_empty());

        let books = sqlx::query_as(
            "SELECT * FROM books \
             WHERE (?1 IS NULL OR title LIKE ?1 OR author LIKE ?1 OR description LIKE ?1) \
             AND (?2 IS NULL OR category = ?2 COLLATE NOCASE) \
             ORDER BY created_at DESC",
        )
        .bind(pattern)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    pub async fn update_book(&self, id: &str, update: BookUpdate) -> Result<Book> {
        let mut book = self.get_book(id).await?;

        if let Some(title) = update.title {
            book.title = title.trim().to_string();
        }
        merge(&mut book.author, update.author);
        merge(&mut book.description, update.description);
        merge(&mut book.category, update.category);
        merge(&mut book.isbn, update.isbn);
        merge(&mut book.cover_url, update.cover_url);
        merge(&mut book.file_url, update.file_url);
        book.updated_at = Utc::now();

        sqlx::query(
            "UPDATE books SET title = ?, author = ?, description = ?, category = ?, isbn = ?, \
             cover_url = ?, file_url = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(&book.category)
        .bind(&book.isbn)
        .bind(&book.cover_url)
        .bind(&book.file_url)
        .bind(book.updated_at)
        .bind(&book.id)
        .execute(&self.pool)
        .await?;

        info!("[Catalog] Book updated: {}", book.id);
        Ok(book)
    }

    pub async fn delete_book(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Book"));
        }
        info!("[Catalog] Book deleted: {}", id);
        Ok(())
    }

    // ========== Videos ==========

    pub async fn create_video(&self, uploaded_by: &str, new: NewVideo) -> Result<Video> {
        let now = Utc::now();
        let video = Video {
            id: Uuid::new_v4().to_string(),
            title: new.title.trim().to_string(),
            creator: clean(new.creator),
            description: clean(new.description),
            category: clean(new.category),
            thumbnail_url: clean(new.thumbnail_url),
            video_url: clean(new.video_url),
            duration_secs: new.duration_secs,
            uploaded_by: uploaded_by.to_string(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO videos (id, title, creator, description, category, thumbnail_url, video_url, \
             duration_secs, uploaded_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&video.id)
        .bind(&video.title)
        .bind(&video.creator)
        .bind(&video.description)
        .bind(&video.category)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.duration_secs)
        .bind(&video.uploaded_by)
        .bind(video.created_at)
        .bind(video.updated_at)
        .execute(&self.pool)
        .await?;

        info!("[Catalog] Video added: {} ({})", video.title, video.id);
        Ok(video)
    }

    pub async fn get_video(&self, id: &str) -> Result<Video> {
        sqlx::query_as("SELECT * FROM videos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound("Video"))
    }

    pub async fn list_videos(&self, search: Option<&str>, category: Option<&str>) -> Result<Vec<Video>> {
        let pattern = like_pattern(search);
        let category = category.map(str::trim).filter(|c| !c.is_empty());

        let videos = sqlx::query_as(
            "SELECT * FROM videos \
             WHERE (?1 IS NULL OR title LIKE ?1 OR creator LIKE ?1 OR description LIKE ?1) \
             AND (?2 IS NULL OR category = ?2 COLLATE NOCASE) \
             ORDER BY created_at DESC",
        )
        .bind(pattern)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(videos)
    }

    pub async fn update_video(&self, id: &str, update: VideoUpdate) -> Result<Video> {
        let mut video = self.get_video(id).await?;

        if let Some(title) = update.title {
            video.title = title.trim().to_string();
        }
        merge(&mut video.creator, update.creator);
        merge(&mut video.description, update.description);
        merge(&mut video.category, update.category);
        merge(&mut video.thumbnail_url, update.thumbnail_url);
        merge(&mut video.video_url, update.video_url);
        if update.duration_secs.is_some() {
            video.duration_secs = update.duration_secs;
        }
        video.updated_at = Utc::now();

        sqlx::query(
            "UPDATE videos SET title = ?, creator = ?, description = ?, category = ?, thumbnail_url = ?, \
             video_url = ?, duration_secs = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&video.title)
        .bind(&video.creator)
        .bind(&video.description)
        .bind(&video.category)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.duration_secs)
        .bind(video.updated_at)
        .bind(&video.id)
        .execute(&self.pool)
        .await?;

        info!("[Catalog] Video updated: {}", video.id);
        Ok(video)
    }

    pub async fn delete_video(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM videos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Video"));
        }
        info!("[Catalog] Video deleted: {}", id);
        Ok(())
    }

    /// (books, videos)
    pub async fn counts(&self) -> Result<(i64, i64)> {
        let counts = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM books), (SELECT COUNT(*) FROM videos)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::{AuthManager, NewUser};
    use crate::core::db;

    async fn setup() -> (CatalogManager, String) {
        let pool = db::connect_in_memory().await.unwrap();
        let auth = AuthManager::new(pool.clone(), 7, 4).await.unwrap();
        let admin = auth
            .signup(NewUser {
                name: "Librarian".into(),
                email: "librarian@uni.edu".into(),
                password: "secret123".into(),
            })
            .await
            .unwrap();
        (CatalogManager::new(pool).await.unwrap(), admin.id)
    }

    fn book(title: &str, category: &str) -> NewBook {
        NewBook {
            title: title.into(),
            author: Some("Someone".into()),
            category: Some(category.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_book_lifecycle() {
        let (catalog, admin) = setup().await;

        let created = catalog.create_book(&admin, book("  Linear Algebra ", "Math")).await.unwrap();
        assert_eq!(created.title, "Linear Algebra");
        assert_eq!(catalog.get_book(&created.id).await.unwrap(), created);

        let updated = catalog
            .update_book(
                &created.id,
                BookUpdate {
                    author: Some(String::new()),
                    isbn: Some("978-0".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Linear Algebra");
        assert_eq!(updated.author, None);
        assert_eq!(updated.isbn.as_deref(), Some("978-0"));

        catalog.delete_book(&created.id).await.unwrap();
        assert!(matches!(
            catalog.get_book(&created.id).await,
            Err(Error::NotFound("Book"))
        ));
        assert!(matches!(
            catalog.delete_book(&created.id).await,
            Err(Error::NotFound("Book"))
        ));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (catalog, admin) = setup().await;
        catalog.create_book(&admin, book("Organic Chemistry", "Science")).await.unwrap();
        catalog.create_book(&admin, book("Real Analysis", "Math")).await.unwrap();
        catalog.create_book(&admin, book("Abstract Algebra", "math")).await.unwrap();

        assert_eq!(catalog.list_books(None, None).await.unwrap().len(), 3);
        assert_eq!(catalog.list_books(None, Some("MATH")).await.unwrap().len(), 2);

        let found = catalog.list_books(Some("chem"), None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Organic Chemistry");

        assert!(catalog.list_books(Some("algebra"), Some("Science")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_videos_and_counts() {
        let (catalog, admin) = setup().await;
        let video = catalog
            .create_video(
                &admin,
                NewVideo {
                    title: "Intro to Rust".into(),
                    video_url: Some("https://videos.example.com/rust".into()),
                    duration_secs: Some(600),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = catalog
            .update_video(
                &video.id,
                VideoUpdate {
                    duration_secs: Some(900),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.duration_secs, Some(900));
        assert_eq!(updated.video_url, video.video_url);

        catalog.create_book(&admin, book("Compilers", "CS")).await.unwrap();
        assert_eq!(catalog.counts().await.unwrap(), (1, 1));
    }
}
