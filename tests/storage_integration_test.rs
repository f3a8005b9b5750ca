//! Integration tests for the catalog storage
//!
//! These run against an in-memory SQLite database and cover category and
//! page creation, validation and the sorted reads behind the pages.

use rango::storage::{SqliteStorage, Storage, StorageError};
use std::sync::Arc;

/// Helper to create SQLite test storage
async fn create_sqlite_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let storage = create_sqlite_storage().await;
    storage.init().await.unwrap();
    storage.create_category("Python", 0, 0).await.unwrap();
    storage.init().await.unwrap();

    assert!(storage.get_category("python").await.unwrap().is_some());
}

#[tokio::test]
async fn test_create_category_derives_slug() {
    let storage = create_sqlite_storage().await;

    let category = storage
        .create_category("Other Frameworks", 32, 16)
        .await
        .unwrap();

    assert_eq!(category.name, "Other Frameworks");
    assert_eq!(category.slug, "other-frameworks");
    assert_eq!(category.views, 32);
    assert_eq!(category.likes, 16);

    let fetched = storage
        .get_category("other-frameworks")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.id, category.id);
}

#[tokio::test]
async fn test_duplicate_category_conflicts() {
    let storage = create_sqlite_storage().await;
    storage.create_category("Django", 0, 0).await.unwrap();

    let same_name = storage.create_category("Django", 1, 1).await;
    assert!(matches!(same_name, Err(StorageError::Conflict)));

    // Different name, same slug
    let same_slug = storage.create_category("django", 1, 1).await;
    assert!(matches!(same_slug, Err(StorageError::Conflict)));
}

#[tokio::test]
async fn test_invalid_category_names_rejected() {
    let storage = create_sqlite_storage().await;

    assert!(matches!(
        storage.create_category("   ", 0, 0).await,
        Err(StorageError::Invalid { field: "name", .. })
    ));
    assert!(matches!(
        storage.create_category(&"x".repeat(129), 0, 0).await,
        Err(StorageError::Invalid { field: "name", .. })
    ));
    assert!(matches!(
        storage.create_category("?!", 0, 0).await,
        Err(StorageError::Invalid { field: "name", .. })
    ));

    assert!(storage
        .create_category(&"x".repeat(128), 0, 0)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_categories_ordered_by_likes() {
    let storage = create_sqlite_storage().await;
    storage.create_category("Django", 64, 32).await.unwrap();
    storage.create_category("Python", 128, 64).await.unwrap();
    storage.create_category("Other Frameworks", 32, 16).await.unwrap();

    let names: Vec<String> = storage
        .list_categories(Some(10))
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Python", "Django", "Other Frameworks"]);

    assert_eq!(storage.list_categories(Some(2)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_categories_without_limit() {
    let storage = create_sqlite_storage().await;
    for i in 0..25 {
        storage
            .create_category(&format!("Category {}", i), 0, i)
            .await
            .unwrap();
    }

    let categories = storage.list_categories(None).await.unwrap();
    assert_eq!(categories.len(), 25);
    assert_eq!(categories[0].name, "Category 24");
    assert_eq!(categories[24].name, "Category 0");
}

#[tokio::test]
async fn test_create_page_requires_category() {
    let storage = create_sqlite_storage().await;

    let result = storage
        .create_page("missing", "Title", "https://example.com", 0)
        .await;
    assert!(matches!(result, Err(StorageError::MissingCategory(slug)) if slug == "missing"));
}

#[tokio::test]
async fn test_invalid_pages_rejected() {
    let storage = create_sqlite_storage().await;
    storage.create_category("Python", 0, 0).await.unwrap();

    assert!(matches!(
        storage.create_page("python", "", "https://example.com", 0).await,
        Err(StorageError::Invalid { field: "title", .. })
    ));
    assert!(matches!(
        storage
            .create_page("python", &"t".repeat(129), "https://example.com", 0)
            .await,
        Err(StorageError::Invalid { field: "title", .. })
    ));
    assert!(matches!(
        storage.create_page("python", "Docs", "  ", 0).await,
        Err(StorageError::Invalid { field: "url", .. })
    ));
}

#[tokio::test]
async fn test_top_pages_ordered_by_views() {
    let storage = create_sqlite_storage().await;
    storage.create_category("Python", 0, 0).await.unwrap();
    storage.create_category("Django", 0, 0).await.unwrap();

    for (category, title, views) in [
        ("python", "Tutorial", 32),
        ("python", "Think Python", 16),
        ("django", "Tango", 128),
        ("django", "Django Rocks", 4),
        ("python", "Ten Minutes", 8),
        ("django", "Official", 64),
    ] {
        storage
            .create_page(category, title, "https://example.com", views)
            .await
            .unwrap();
    }

    let titles: Vec<String> = storage
        .top_pages(5)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect();
    assert_eq!(
        titles,
        vec!["Tango", "Official", "Tutorial", "Think Python", "Ten Minutes"]
    );
}

#[tokio::test]
async fn test_pages_for_category() {
    let storage = create_sqlite_storage().await;
    let python = storage.create_category("Python", 0, 0).await.unwrap();
    let django = storage.create_category("Django", 0, 0).await.unwrap();

    storage
        .create_page("python", "Tutorial", "https://docs.python.org", 1)
        .await
        .unwrap();
    storage
        .create_page("python", "Think Python", "https://greenteapress.com", 5)
        .await
        .unwrap();
    storage
        .create_page("django", "Tango", "https://tangowithdjango.com", 9)
        .await
        .unwrap();

    let pages = storage.pages_for_category(python.id).await.unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].title, "Think Python");
    assert!(pages.iter().all(|p| p.category_id == python.id));

    let pages = storage.pages_for_category(django.id).await.unwrap();
    assert_eq!(pages.len(), 1);

    assert!(storage.pages_for_category(9999).await.unwrap().is_empty());
}
