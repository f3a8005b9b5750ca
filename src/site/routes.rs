use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};

use crate::config::SessionConfig;

use super::handlers::{about, category, health_check, index, root, SiteState};

pub fn create_site_router<S>(state: SiteState, store: S, session: &SessionConfig) -> Router
where
    S: SessionStore + Clone,
{
    let state = Arc::new(state);

    // Only written to when visits are kept in the session
    let session_layer = SessionManagerLayer::new(store)
        .with_secure(session.secure)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::days(i64::from(
            session.expiry_days,
        ))));

    Router::new()
        .route("/", get(root))
        .route("/rango/", get(index))
        .route("/rango/about/", get(about))
        .route("/rango/category/{slug}/", get(category))
        .route("/health", get(health_check))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
