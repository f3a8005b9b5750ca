use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rango::config::{Config, VisitStoreKind};
use rango::render::Templates;
use rango::session::{create_session_store, spawn_expired_session_cleanup};
use rango::site::{create_site_router, SiteState};
use rango::storage::{SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rango=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    info!("Using SQLite storage: {}", config.database.url);
    let sqlite = SqliteStorage::new(&config.database.url, config.database.max_connections).await?;
    let session_store = create_session_store(sqlite.pool()).await?;
    let storage: Arc<dyn Storage> = Arc::new(sqlite);

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    spawn_expired_session_cleanup(session_store.clone(), config.session.cleanup_interval);
    info!(
        "Purging expired sessions every {}s",
        config.session.cleanup_interval.as_secs()
    );

    // Load templates
    let templates = Arc::new(Templates::load(config.templates.dir.as_deref())?);
    if let Some(ref dir) = config.templates.dir {
        info!("🎨 Rendering templates from directory: {}", dir);
    } else {
        info!("🎨 Rendering embedded templates");
    }

    match config.visits.store {
        VisitStoreKind::Cookie => info!(
            "🍪 Tracking visits in cookies (threshold {}s, signed: {})",
            config.visits.threshold.as_secs(),
            config.visits.sign_cookies
        ),
        VisitStoreKind::Session => info!(
            "🗂  Tracking visits in sessions (threshold {}s)",
            config.visits.threshold.as_secs()
        ),
    }

    let state = SiteState::new(storage, templates, &config.visits);
    let router = create_site_router(state, session_store, &config.session);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Rango listening on http://{}/rango/", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
