//! Post pages
//!
//! - `GET /` global feed, cached per viewer
//! - `GET /group/{slug}/` group feed
//! - `GET /profile/{username}/` author feed
//! - `GET /posts/{id}/` post detail with comments
//! - `GET|POST /create/`, `GET|POST /posts/{id}/edit/`
//! - `POST /posts/{id}/comment/`, `POST /posts/{id}/delete/`

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use tera::Context as TeraContext;

use crate::api::common::{parse_id, PageQuery};
use crate::api::middleware::{AppState, LoggedIn, Viewer};
use crate::api::responses::{render_page, PageError};
use crate::services::{
    CommentForm, CommentServiceError, FeedContext, FeedSubject, FormErrors, ImageUpload, PageCache,
    PostForm, PostServiceError,
};
use crate::theme::StandardTemplateVars;

/// GET / - Global feed
///
/// Rendered pages are cached per Cookie header and page number for
/// `feed.index_cache_seconds`.
pub async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    vars: StandardTemplateVars,
    headers: HeaderMap,
    query: PageQuery,
) -> Result<Html<String>, PageError> {
    let page = query.number();
    let cookie = headers.get(header::COOKIE).and_then(|v| v.to_str().ok());
    let key = PageCache::index_key(cookie, page);

    if let Some(html) = state.page_cache.get(&key).await {
        return Ok(Html(html));
    }

    let feed = state
        .feed_service
        .get_feed(&FeedContext::Global, viewer.user(), page)
        .await?;
    let mut context = TeraContext::new();
    context.insert("page", &feed.page);
    let html = render_page(&state, "posts/index.html", &context, &vars)?;

    state.page_cache.put(&key, &html.0, state.page_cache.ttl()).await;
    Ok(html)
}

/// GET /group/{slug}/ - Posts of a group
pub async fn group_posts(
    State(state): State<AppState>,
    viewer: Viewer,
    vars: StandardTemplateVars,
    Path(slug): Path<String>,
    query: PageQuery,
) -> Result<Html<String>, PageError> {
    let feed = state
        .feed_service
        .get_feed(&FeedContext::Group(slug), viewer.user(), query.number())
        .await?;

    let mut context = TeraContext::new();
    if let FeedSubject::Group(ref group) = feed.subject {
        context.insert("group", group);
    }
    context.insert("page", &feed.page);
    render_page(&state, "posts/group_list.html", &context, &vars)
}

/// GET /profile/{username}/ - Posts of an author
pub async fn profile(
    State(state): State<AppState>,
    viewer: Viewer,
    vars: StandardTemplateVars,
    Path(username): Path<String>,
    query: PageQuery,
) -> Result<Html<String>, PageError> {
    let feed = state
        .feed_service
        .get_feed(&FeedContext::Author(username), viewer.user(), query.number())
        .await?;

    let mut context = TeraContext::new();
    if let FeedSubject::Author { ref author, following } = feed.subject {
        context.insert("author", author);
        context.insert("following", &following);
    }
    context.insert("page", &feed.page);
    render_page(&state, "posts/profile.html", &context, &vars)
}

/// GET /posts/{id}/ - Post with its comments
pub async fn post_detail(
    State(state): State<AppState>,
    vars: StandardTemplateVars,
    Path(id): Path<String>,
) -> Result<Html<String>, PageError> {
    let detail = state.post_service.get_detail(parse_id(&id)?).await?;

    let mut context = TeraContext::new();
    context.insert("post", &detail.post);
    context.insert("comments", &detail.comments);
    context.insert("form", &CommentForm::default());
    context.insert("errors", &FormErrors::new());
    render_page(&state, "posts/post_detail.html", &context, &vars)
}

/// GET /create/ - Empty post form
pub async fn create_form(
    State(state): State<AppState>,
    LoggedIn(_user): LoggedIn,
    vars: StandardTemplateVars,
) -> Result<Html<String>, PageError> {
    render_post_form(&state, &vars, &PostForm::default(), &FormErrors::new(), None).await
}

/// POST /create/ - Publish a post, then go to the author's profile
pub async fn create_submit(
    State(state): State<AppState>,
    LoggedIn(user): LoggedIn,
    vars: StandardTemplateVars,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let (form, image) = read_post_form(multipart).await?;
    match state.post_service.create(&user, &form, image).await {
        Ok(_) => Ok(Redirect::to(&profile_path(&user.username)).into_response()),
        Err(PostServiceError::Validation(errors)) => {
            Ok(render_post_form(&state, &vars, &form, &errors, None).await?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /posts/{id}/edit/ - Post form filled with the current values
///
/// Only the author may edit; everyone else is sent back to the post.
pub async fn edit_form(
    State(state): State<AppState>,
    LoggedIn(user): LoggedIn,
    vars: StandardTemplateVars,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let post = match state.post_service.get_for_edit(&user, id).await {
        Ok(post) => post,
        Err(PostServiceError::NotAuthor { .. }) => return Ok(Redirect::to(&post_path(id)).into_response()),
        Err(e) => return Err(e.into()),
    };

    let form = PostForm {
        text: post.text,
        group: post.group_id.map(|g| g.to_string()).unwrap_or_default(),
    };
    Ok(render_post_form(&state, &vars, &form, &FormErrors::new(), Some(id))
        .await?
        .into_response())
}

/// POST /posts/{id}/edit/ - Save an edited post, then go to its page
pub async fn edit_submit(
    State(state): State<AppState>,
    LoggedIn(user): LoggedIn,
    vars: StandardTemplateVars,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, PageError> {
    let id = parse_id(&id)?;
    let (form, image) = read_post_form(multipart).await?;
    match state.post_service.update(&user, id, &form, image).await {
        Ok(_) | Err(PostServiceError::NotAuthor { .. }) => Ok(Redirect::to(&post_path(id)).into_response()),
        Err(PostServiceError::Validation(errors)) => Ok(render_post_form(&state, &vars, &form, &errors, Some(id))
            .await?
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

/// POST /posts/{id}/comment/ - Add a comment, then go back to the post
///
/// Invalid comments are dropped without a message.
pub async fn add_comment(
    State(state): State<AppState>,
    LoggedIn(user): LoggedIn,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect, PageError> {
    let id = parse_id(&id)?;
    match state.comment_service.add(&user, id, &form).await {
        Ok(_) | Err(CommentServiceError::Validation(_)) => Ok(Redirect::to(&post_path(id))),
        Err(e) => Err(e.into()),
    }
}

/// POST /posts/{id}/delete/ - Delete own post
///
/// Cached feed pages keep showing the post until they expire.
pub async fn delete_post(
    State(state): State<AppState>,
    LoggedIn(user): LoggedIn,
    Path(id): Path<String>,
) -> Result<Redirect, PageError> {
    let id = parse_id(&id)?;
    match state.post_service.delete(&user, id).await {
        Ok(()) => Ok(Redirect::to(&profile_path(&user.username))),
        Err(PostServiceError::NotAuthor { .. }) => Ok(Redirect::to(&post_path(id))),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn post_path(id: i64) -> String {
    format!("/posts/{}/", id)
}

pub(crate) fn profile_path(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

async fn render_post_form(
    state: &AppState,
    vars: &StandardTemplateVars,
    form: &PostForm,
    errors: &FormErrors,
    post_id: Option<i64>,
) -> Result<Html<String>, PageError> {
    let groups = state.group_service.list().await?;

    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("groups", &groups);
    context.insert("is_edit", &post_id.is_some());
    if let Some(id) = post_id {
        context.insert("post_id", &id);
    }
    render_page(state, "posts/create_post.html", &context, vars)
}

/// Collect the `text`, `group` and `image` fields of a post form.
///
/// A file input left empty arrives as a part with no file name and no
/// bytes and is treated as no image.
async fn read_post_form(mut multipart: Multipart) -> Result<(PostForm, Option<ImageUpload>), PageError> {
    let mut form = PostForm::default();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PageError::BadRequest(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "text" | "group" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| PageError::BadRequest(format!("Failed to read field {}: {}", name, e)))?;
                if name == "text" {
                    form.text = value;
                } else {
                    form.group = value;
                }
            }
            "image" => {
                let file_name = field.file_name().map(str::to_string).filter(|n| !n.is_empty());
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| PageError::BadRequest(format!("Failed to read image: {}", e)))?;
                if file_name.is_some() || !data.is_empty() {
                    image = Some(ImageUpload {
                        file_name,
                        content_type,
                        data: data.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok((form, image))
}
