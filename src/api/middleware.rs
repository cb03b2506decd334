//! API middleware
//!
//! Contains middleware for:
//! - Viewer resolution (session cookie to `User`)
//! - Error pages (404/500 bodies and login redirects)
//!
//! and the extractors handlers use to read the viewer.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use std::convert::Infallible;
use std::sync::Arc;
use tera::Context as TeraContext;

use crate::api::common::session_token;
use crate::api::responses::{ErrorPage, PageError};
use crate::cache::Cache;
use crate::config::{AuthConfig, Config, UploadConfig};
use crate::db::repositories::{
    SqlxCommentRepository, SqlxFollowRepository, SqlxGroupRepository, SqlxPostRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    CommentService, FeedService, FollowService, GroupService, PageCache, PostService, UserService,
};
use crate::theme::{StandardTemplateVars, ThemeEngine};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub feed_service: Arc<FeedService>,
    pub follow_service: Arc<FollowService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    pub group_service: Arc<GroupService>,
    pub page_cache: Arc<PageCache>,
    pub theme_engine: Arc<ThemeEngine>,
    pub auth_config: Arc<AuthConfig>,
    pub upload_config: Arc<UploadConfig>,
}

impl AppState {
    /// Wire repositories and services over `pool` and `cache`
    pub fn new(pool: DynDatabasePool, cache: Arc<Cache>, config: &Config) -> anyhow::Result<Self> {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let group_repo = SqlxGroupRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());

        let follow_service = Arc::new(FollowService::new(
            user_repo.clone(),
            SqlxFollowRepository::boxed(pool.clone()),
        ));
        let feed_service = Arc::new(FeedService::new(
            post_repo.clone(),
            group_repo.clone(),
            user_repo.clone(),
            follow_service.clone(),
            &config.feed,
        ));
        let user_service = Arc::new(UserService::with_session_days(
            user_repo,
            SqlxSessionRepository::boxed(pool),
            config.auth.session_days,
        ));
        let post_service = Arc::new(PostService::new(
            post_repo.clone(),
            group_repo.clone(),
            comment_repo.clone(),
            config.upload.clone(),
        ));

        Ok(Self {
            user_service,
            feed_service,
            follow_service,
            post_service,
            comment_service: Arc::new(CommentService::new(post_repo, comment_repo)),
            group_service: Arc::new(GroupService::new(group_repo)),
            page_cache: Arc::new(PageCache::new(
                cache,
                std::time::Duration::from_secs(config.feed.index_cache_seconds),
            )),
            theme_engine: Arc::new(ThemeEngine::new()?),
            auth_config: Arc::new(config.auth.clone()),
            upload_config: Arc::new(config.upload.clone()),
        })
    }
}

/// The user making the request, if logged in
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

/// A logged-in viewer. Anonymous requests are redirected to the login page.
#[derive(Debug, Clone)]
pub struct LoggedIn(pub User);

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

impl<S> FromRequestParts<S> for LoggedIn
where
    S: Send + Sync,
{
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Viewer>()
            .and_then(|viewer| viewer.0.clone())
            .map(LoggedIn)
            .ok_or(PageError::LoginRequired)
    }
}

impl<S> FromRequestParts<S> for StandardTemplateVars
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let viewer = parts.extensions.get::<Viewer>();
        Ok(StandardTemplateVars::new(parts.uri.path()).with_user(viewer.and_then(Viewer::user)))
    }
}

/// Resolve the `session` cookie into a [`Viewer`].
///
/// Unknown or expired sessions, and session store failures, leave the
/// request anonymous.
pub async fn load_viewer(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let mut viewer = Viewer::default();
    if let Some(token) = session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(user) => viewer = Viewer(user),
            Err(e) => tracing::warn!("Session validation failed: {}", e),
        }
    }
    request.extensions_mut().insert(viewer);
    next.run(request).await
}

/// Turn [`PageError`] responses into rendered error pages and login redirects.
pub async fn render_error_pages(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let viewer = request.extensions().get::<Viewer>().cloned().unwrap_or_default();
    let path = request.uri().path().to_string();
    let next_path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let response = next.run(request).await;
    let Some(page) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };

    let (status, template) = match page {
        ErrorPage::LoginRequired => {
            return login_redirect(&state.auth_config.login_url, &next_path);
        }
        ErrorPage::NotFound => (StatusCode::NOT_FOUND, "core/404.html"),
        ErrorPage::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "core/500.html"),
    };

    let vars = StandardTemplateVars::new(path).with_user(viewer.user());
    let html = state
        .theme_engine
        .render_with_fallback(template, &TeraContext::new(), &vars);
    let mut response = (status, Html(html)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-store"));
    response
}

/// 302 to the login page, remembering where the viewer was going
pub fn login_redirect(login_url: &str, next_path: &str) -> Response {
    let location = format!("{}?next={}", login_url, urlencoding::encode(next_path));
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
