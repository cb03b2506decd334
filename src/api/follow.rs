//! Subscription pages
//!
//! All three routes need a logged-in viewer.

use axum::{
    extract::{Path, State},
    response::{Html, Redirect},
};
use tera::Context as TeraContext;

use crate::api::common::PageQuery;
use crate::api::middleware::{AppState, LoggedIn};
use crate::api::posts::profile_path;
use crate::api::responses::{render_page, PageError};
use crate::services::FeedContext;
use crate::theme::StandardTemplateVars;

/// GET /follow/ - Posts by the authors the viewer follows
pub async fn follow_index(
    State(state): State<AppState>,
    LoggedIn(user): LoggedIn,
    vars: StandardTemplateVars,
    query: PageQuery,
) -> Result<Html<String>, PageError> {
    let feed = state
        .feed_service
        .get_feed(&FeedContext::FollowedAuthors, Some(&user), query.number())
        .await?;

    let mut context = TeraContext::new();
    context.insert("page", &feed.page);
    render_page(&state, "posts/follow.html", &context, &vars)
}

/// GET /profile/{username}/follow/
pub async fn profile_follow(
    State(state): State<AppState>,
    LoggedIn(user): LoggedIn,
    Path(username): Path<String>,
) -> Result<Redirect, PageError> {
    let author = state.follow_service.follow(&user, &username).await?;
    Ok(Redirect::to(&profile_path(&author.username)))
}

/// GET /profile/{username}/unfollow/
pub async fn profile_unfollow(
    State(state): State<AppState>,
    LoggedIn(user): LoggedIn,
    Path(username): Path<String>,
) -> Result<Redirect, PageError> {
    let author = state.follow_service.unfollow(&user, &username).await?;
    Ok(Redirect::to(&profile_path(&author.username)))
}
