use crate::models::{Category, Page};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("category already exists")]
    Conflict,
    #[error("category '{0}' does not exist")]
    MissingCategory(String),
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Create a category; the slug is derived from the name
    async fn create_category(&self, name: &str, views: i64, likes: i64) -> StorageResult<Category>;

    /// Get a category by slug
    async fn get_category(&self, slug: &str) -> Result<Option<Category>>;

    /// Categories ordered by likes, most liked first; `None` lists all
    async fn list_categories(&self, limit: Option<i64>) -> Result<Vec<Category>>;

    /// Create a page inside the category identified by `category_slug`
    async fn create_page(
        &self,
        category_slug: &str,
        title: &str,
        url: &str,
        views: i64,
    ) -> StorageResult<Page>;

    /// Pages across all categories ordered by views, most viewed first
    async fn top_pages(&self, limit: i64) -> Result<Vec<Page>>;

    /// Pages of one category ordered by views
    async fn pages_for_category(&self, category_id: i64) -> Result<Vec<Page>>;
}
