//! HTTP layer - handlers and routing
//!
//! Server-rendered pages:
//! - Feeds (global, group, author, followed authors)
//! - Post detail, create, edit, delete and comments
//! - Follow/unfollow
//! - Sign-up, login, logout
//! - Uploaded media

pub mod auth;
pub mod common;
pub mod follow;
pub mod media;
pub mod middleware;
pub mod posts;
pub mod responses;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use middleware::{AppState, LoggedIn, Viewer};
pub use responses::PageError;

/// Room for the non-file fields of a post form on top of the image
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.upload_config.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(posts::index))
        .route("/group/{slug}/", get(posts::group_posts))
        .route("/profile/{username}/", get(posts::profile))
        .route("/profile/{username}/follow/", get(follow::profile_follow))
        .route("/profile/{username}/unfollow/", get(follow::profile_unfollow))
        .route("/follow/", get(follow::follow_index))
        .route("/create/", get(posts::create_form).post(posts::create_submit))
        .route("/posts/{id}/", get(posts::post_detail))
        .route("/posts/{id}/edit/", get(posts::edit_form).post(posts::edit_submit))
        .route("/posts/{id}/comment/", post(posts::add_comment))
        .route("/posts/{id}/delete/", post(posts::delete_post))
        .route("/auth/signup/", get(auth::signup_form).post(auth::signup))
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/logout/", get(auth::logout))
        .route("/media/{*path}", get(media::serve_media))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        // Outermost app layer: the viewer must be known before error pages render
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::load_viewer,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: axum::http::Uri) -> PageError {
    PageError::NotFound(format!("route {}", uri.path()))
}
