//! Shared response types
//!
//! Handlers return `Result<_, PageError>`. The error itself only carries a
//! status code and an [`ErrorPage`] marker; `middleware::render_error_pages`
//! renders the body, since it has the templates and the viewer at hand.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tera::Context as TeraContext;

use crate::api::AppState;
use crate::services::{
    CommentServiceError, FeedError, FollowError, GroupServiceError, PostServiceError,
    UserServiceError,
};
use crate::theme::StandardTemplateVars;

/// Error returned by page handlers
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// Unknown path, object or slug
    #[error("Not found: {0}")]
    NotFound(String),

    /// The page needs a logged-in viewer
    #[error("Login required")]
    LoginRequired,

    /// Malformed request body
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Datastore or template failure
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Which error page a response should get
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPage {
    NotFound,
    LoginRequired,
    Internal,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, page) = match &self {
            PageError::NotFound(what) => {
                tracing::debug!("Not found: {}", what);
                (StatusCode::NOT_FOUND, Some(ErrorPage::NotFound))
            }
            PageError::LoginRequired => (StatusCode::UNAUTHORIZED, Some(ErrorPage::LoginRequired)),
            PageError::BadRequest(reason) => {
                tracing::debug!("Bad request: {}", reason);
                (StatusCode::BAD_REQUEST, None)
            }
            PageError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, Some(ErrorPage::Internal))
            }
        };

        let mut response = match page {
            Some(_) => status.into_response(),
            None => (status, self.to_string()).into_response(),
        };
        if let Some(page) = page {
            response.extensions_mut().insert(page);
        }
        response
    }
}

impl From<FeedError> for PageError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::NotFound(what) => PageError::NotFound(what),
            FeedError::Unauthenticated => PageError::LoginRequired,
            FeedError::InternalError(e) => PageError::Internal(e),
        }
    }
}

impl From<FollowError> for PageError {
    fn from(err: FollowError) -> Self {
        match err {
            FollowError::NotFound(name) => PageError::NotFound(format!("user '{}'", name)),
            FollowError::InternalError(e) => PageError::Internal(e),
        }
    }
}

impl From<PostServiceError> for PageError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(id) => PageError::NotFound(format!("post {}", id)),
            PostServiceError::InternalError(e) => PageError::Internal(e),
            other => PageError::Internal(anyhow::anyhow!("Unhandled post error: {}", other)),
        }
    }
}

impl From<CommentServiceError> for PageError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound(id) => PageError::NotFound(format!("post {}", id)),
            CommentServiceError::InternalError(e) => PageError::Internal(e),
            other => PageError::Internal(anyhow::anyhow!("Unhandled comment error: {}", other)),
        }
    }
}

impl From<GroupServiceError> for PageError {
    fn from(err: GroupServiceError) -> Self {
        match err {
            GroupServiceError::InternalError(e) => PageError::Internal(e),
            other => PageError::Internal(anyhow::anyhow!("Unhandled group error: {}", other)),
        }
    }
}

impl From<UserServiceError> for PageError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InternalError(e) => PageError::Internal(e),
            other => PageError::Internal(anyhow::anyhow!("Unhandled user error: {}", other)),
        }
    }
}

/// Render a page template with the standard variables
pub fn render_page(
    state: &AppState,
    template: &str,
    context: &TeraContext,
    vars: &StandardTemplateVars,
) -> Result<Html<String>, PageError> {
    let html = state
        .theme_engine
        .render_with_standard_vars(template, context, vars)?;
    Ok(Html(html))
}
