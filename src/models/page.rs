use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Longest page title accepted
pub const MAX_TITLE_LEN: usize = 128;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Page {
    pub id: i64,
    pub category_id: i64,
    pub title: String,
    pub url: String,
    pub views: i64,
}
