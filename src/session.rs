//! Server-side sessions kept in the application's SQLite database.
//!
//! Session rows live in the `tower_sessions` table next to the catalog.
//! Expired rows are purged by a background task so the table does not
//! grow with every client that stops coming back.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_sessions::ExpiredDeletion;
use tower_sessions_sqlx_store::SqliteStore;

/// Create the session store on `pool`, creating its table if needed.
pub async fn create_session_store(pool: SqlitePool) -> Result<SqliteStore> {
    let store = SqliteStore::new(pool);
    store
        .migrate()
        .await
        .context("failed to create the session table")?;
    Ok(store)
}

/// Delete expired sessions every `period` until the runtime shuts down.
pub fn spawn_expired_session_cleanup(store: SqliteStore, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = store.continuously_delete_expired(period).await {
            tracing::error!(error = %err, "expired session cleanup stopped");
        }
    })
}
