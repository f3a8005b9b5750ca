use crate::models::{slugify, Category, Page, MAX_NAME_LEN, MAX_TITLE_LEN};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid SQLite URL '{}'", database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Handle to the connection pool, shared with the session store
    pub fn pool(&self) -> SqlitePool {
        self.pool.as_ref().clone()
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                slug TEXT NOT NULL UNIQUE,
                views INTEGER NOT NULL DEFAULT 0,
                likes INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                views INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_categories_likes ON categories(likes)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_category ON pages(category_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_views ON pages(views)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_category(&self, name: &str, views: i64, likes: i64) -> StorageResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::Invalid {
                field: "name",
                reason: "must not be empty",
            });
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(StorageError::Invalid {
                field: "name",
                reason: "must be at most 128 characters",
            });
        }

        let slug = slugify(name);
        if slug.is_empty() {
            return Err(StorageError::Invalid {
                field: "name",
                reason: "must contain at least one letter or digit",
            });
        }

        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, slug, views, likes)
            VALUES (?, ?, ?, ?)
            RETURNING id, name, slug, views, likes
            "#,
        )
        .bind(name)
        .bind(&slug)
        .bind(views)
        .bind(likes)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::Conflict
            } else {
                StorageError::Other(e.into())
            }
        })?;

        Ok(category)
    }

    async fn get_category(&self, slug: &str) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, slug, views, likes
            FROM categories
            WHERE slug = ?
            "#,
        )
        .bind(slug)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(category)
    }

    async fn list_categories(&self, limit: Option<i64>) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, slug, views, likes
            FROM categories
            ORDER BY likes DESC, id ASC
            LIMIT ?
            "#,
        )
        // A negative LIMIT means no limit in SQLite
        .bind(limit.unwrap_or(-1))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(categories)
    }

    async fn create_page(
        &self,
        category_slug: &str,
        title: &str,
        url: &str,
        views: i64,
    ) -> StorageResult<Page> {
        let title = title.trim();
        let url = url.trim();
        if title.is_empty() {
            return Err(StorageError::Invalid {
                field: "title",
                reason: "must not be empty",
            });
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(StorageError::Invalid {
                field: "title",
                reason: "must be at most 128 characters",
            });
        }
        if url.is_empty() {
            return Err(StorageError::Invalid {
                field: "url",
                reason: "must not be empty",
            });
        }

        let category = self
            .get_category(category_slug)
            .await?
            .ok_or_else(|| StorageError::MissingCategory(category_slug.to_string()))?;

        let page = sqlx::query_as::<_, Page>(
            r#"
            INSERT INTO pages (category_id, title, url, views)
            VALUES (?, ?, ?, ?)
            RETURNING id, category_id, title, url, views
            "#,
        )
        .bind(category.id)
        .bind(title)
        .bind(url)
        .bind(views)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        Ok(page)
    }

    async fn top_pages(&self, limit: i64) -> Result<Vec<Page>> {
        let pages = sqlx::query_as::<_, Page>(
            r#"
            SELECT id, category_id, title, url, views
            FROM pages
            ORDER BY views DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(pages)
    }

    async fn pages_for_category(&self, category_id: i64) -> Result<Vec<Page>> {
        let pages = sqlx::query_as::<_, Page>(
            r#"
            SELECT id, category_id, title, url, views
            FROM pages
            WHERE category_id = ?
            ORDER BY views DESC, id ASC
            "#,
        )
        .bind(category_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(pages)
    }
}
