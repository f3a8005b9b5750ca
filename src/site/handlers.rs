use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tower_sessions::{session, Session};

use crate::config::{VisitConfig, VisitStoreKind};
use crate::render::{TemplateContext, Templates};
use crate::storage::Storage;
use crate::visits::{CookieSigner, CookieStore, SessionStore, VisitTracker};

/// Pages shown on the index page
const INDEX_PAGE_LIMIT: i64 = 5;

pub struct SiteState {
    pub storage: Arc<dyn Storage>,
    pub templates: Arc<Templates>,
    pub tracker: VisitTracker,
    pub visit_store: VisitStoreKind,
    pub cookie_signer: Option<CookieSigner>,
}

impl SiteState {
    pub fn new(storage: Arc<dyn Storage>, templates: Arc<Templates>, visits: &VisitConfig) -> Self {
        let cookie_signer = match (visits.sign_cookies, visits.cookie_secret.as_deref()) {
            (false, _) => None,
            (true, Some(secret)) => Some(CookieSigner::new(secret)),
            (true, None) => {
                tracing::warn!("SIGN_COOKIES is set without COOKIE_SECRET; signed visit cookies won't survive restarts");
                Some(CookieSigner::random())
            }
        };

        Self {
            storage,
            templates,
            tracker: VisitTracker::new(visits.threshold),
            visit_store: visits.store,
            cookie_signer,
        }
    }
}

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
    #[error("session error: {0}")]
    Session(#[from] session::Error),
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
}

impl IntoResponse for SiteError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html("<h1>Server Error (500)</h1>"),
        )
            .into_response()
    }
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Count this request against the client's store.
/// Returns the visit count and any `Set-Cookie` headers to attach.
async fn track_visit(
    state: &SiteState,
    headers: &HeaderMap,
    session: &Session,
    now: NaiveDateTime,
) -> Result<(u64, HeaderMap), SiteError> {
    match state.visit_store {
        VisitStoreKind::Cookie => {
            let mut store = CookieStore::from_headers(headers, state.cookie_signer.clone());
            let visits = state.tracker.track(&mut store, now);
            Ok((visits, store.into_headers()))
        }
        VisitStoreKind::Session => {
            let mut store = SessionStore::load(session).await?;
            let visits = state.tracker.track(&mut store, now);
            store.commit(session).await?;
            Ok((visits, HeaderMap::new()))
        }
    }
}

/// Stored visit count, without counting this request
async fn current_visits(
    state: &SiteState,
    headers: &HeaderMap,
    session: &Session,
) -> Result<u64, SiteError> {
    let visits = match state.visit_store {
        VisitStoreKind::Cookie => {
            let store = CookieStore::from_headers(headers, state.cookie_signer.clone());
            state.tracker.current_visits(&store)
        }
        VisitStoreKind::Session => {
            let store = SessionStore::load(session).await?;
            state.tracker.current_visits(&store)
        }
    };
    Ok(visits)
}

/// Send bare requests to the directory
pub async fn root() -> Redirect {
    Redirect::to("/rango/")
}

/// Front page: most liked categories, most viewed pages and the visit count
pub async fn index(
    State(state): State<Arc<SiteState>>,
    headers: HeaderMap,
    session: Session,
) -> Result<Response, SiteError> {
    let categories = state.storage.list_categories(None).await?;
    let pages = state.storage.top_pages(INDEX_PAGE_LIMIT).await?;

    let now = Local::now().naive_local();
    let (visits, cookies) = track_visit(&state, &headers, &session, now).await?;

    let mut context = TemplateContext::new();
    context.insert("categories", &categories);
    context.insert("pages", &pages);
    context.insert("visits", &visits);

    let html = state.templates.render("index.html", &context)?;
    Ok((cookies, Html(html)).into_response())
}

pub async fn about(
    State(state): State<Arc<SiteState>>,
    headers: HeaderMap,
    session: Session,
) -> Result<Html<String>, SiteError> {
    let visits = current_visits(&state, &headers, &session).await?;

    let mut context = TemplateContext::new();
    context.insert("visits", &visits);

    Ok(Html(state.templates.render("about.html", &context)?))
}

/// One category and its pages; unknown slugs render a notice
pub async fn category(
    State(state): State<Arc<SiteState>>,
    Path(slug): Path<String>,
) -> Result<Html<String>, SiteError> {
    let category = state.storage.get_category(&slug).await?;
    let pages = match &category {
        Some(category) => state.storage.pages_for_category(category.id).await?,
        None => Vec::new(),
    };

    let mut context = TemplateContext::new();
    context.insert("category_slug", &slug);
    context.insert("category", &category);
    context.insert("pages", &pages);

    Ok(Html(state.templates.render("category.html", &context)?))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
