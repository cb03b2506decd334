//! Feed assembly
//!
//! Turns a viewing context into one page of posts, newest first:
//! - `Global`: every post
//! - `Group(slug)`: posts filed under the group
//! - `Author(username)`: one author's posts plus whether the viewer follows them
//! - `FollowedAuthors`: posts by everyone the viewer follows
//!
//! Page numbers are clamped into range, see `models::resolve_page`.

use crate::config::FeedConfig;
use crate::db::repositories::{GroupRepository, PostRepository, UserRepository};
use crate::models::{offset, resolve_page, Group, PagedResult, PostFilter, PostView, User};
use crate::services::follow::{FollowError, FollowService};
use anyhow::Context;
use std::sync::Arc;

/// Which posts a feed shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedContext {
    Global,
    Group(String),
    Author(String),
    FollowedAuthors,
}

/// What a resolved feed is about, for page headers
#[derive(Debug, Clone)]
pub enum FeedSubject {
    Global,
    Group(Group),
    Author {
        author: User,
        /// Whether the viewer follows the author
        following: bool,
    },
    FollowedAuthors,
}

/// One page of a feed
#[derive(Debug, Clone)]
pub struct Feed {
    pub subject: FeedSubject,
    pub page: PagedResult<PostView>,
}

/// Error types for feed assembly
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Unknown group slug or username
    #[error("Not found: {0}")]
    NotFound(String),

    /// The feed needs a logged-in viewer
    #[error("Authentication required")]
    Unauthenticated,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<FollowError> for FeedError {
    fn from(err: FollowError) -> Self {
        match err {
            FollowError::NotFound(name) => FeedError::NotFound(name),
            FollowError::InternalError(e) => FeedError::InternalError(e),
        }
    }
}

/// Feed service
pub struct FeedService {
    posts: Arc<dyn PostRepository>,
    groups: Arc<dyn GroupRepository>,
    users: Arc<dyn UserRepository>,
    follow_service: Arc<FollowService>,
    page_size: u32,
    unfiltered_group_feed: bool,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        groups: Arc<dyn GroupRepository>,
        users: Arc<dyn UserRepository>,
        follow_service: Arc<FollowService>,
        config: &FeedConfig,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follow_service,
            page_size: config.page_size.max(1),
            unfiltered_group_feed: config.unfiltered_group_feed,
        }
    }

    /// Assemble page `page` of the feed for `context` as seen by `viewer`.
    ///
    /// # Errors
    /// - `NotFound` for an unknown group slug or author username
    /// - `Unauthenticated` for `FollowedAuthors` without a viewer
    pub async fn get_feed(
        &self,
        context: &FeedContext,
        viewer: Option<&User>,
        page: i64,
    ) -> Result<Feed, FeedError> {
        let (subject, filter) = match context {
            FeedContext::Global => (FeedSubject::Global, PostFilter::All),
            FeedContext::Group(slug) => {
                let group = self
                    .groups
                    .get_by_slug(slug)
                    .await
                    .context("Failed to get group")?
                    .ok_or_else(|| FeedError::NotFound(format!("group '{}'", slug)))?;
                let filter = if self.unfiltered_group_feed {
                    PostFilter::All
                } else {
                    PostFilter::Group(group.id)
                };
                (FeedSubject::Group(group), filter)
            }
            FeedContext::Author(username) => {
                let author = self
                    .users
                    .get_by_username(username)
                    .await
                    .context("Failed to get author")?
                    .ok_or_else(|| FeedError::NotFound(format!("user '{}'", username)))?;
                let following = self.follow_service.is_following(viewer, &author).await?;
                let filter = PostFilter::Author(author.id);
                (FeedSubject::Author { author, following }, filter)
            }
            FeedContext::FollowedAuthors => {
                let viewer = viewer.ok_or(FeedError::Unauthenticated)?;
                (FeedSubject::FollowedAuthors, PostFilter::FollowedBy(viewer.id))
            }
        };

        let page = self.paginate(filter, page).await?;
        Ok(Feed { subject, page })
    }

    async fn paginate(&self, filter: PostFilter, requested: i64) -> anyhow::Result<PagedResult<PostView>> {
        let total = self.posts.count(filter).await.context("Failed to count posts")?;
        let page = resolve_page(requested, total, self.page_size);
        let items = self
            .posts
            .list(filter, offset(page, self.page_size), i64::from(self.page_size))
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(items, total, page, self.page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        FollowRepository, SqlxFollowRepository, SqlxGroupRepository, SqlxPostRepository,
        SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{CreateGroupInput, Post};
    use chrono::{Duration, Utc};

    struct Fixture {
        pool: DynDatabasePool,
        service: FeedService,
        posts: Arc<dyn PostRepository>,
        users: Arc<dyn UserRepository>,
        groups: Arc<dyn GroupRepository>,
    }

    async fn setup_with(config: FeedConfig) -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let posts = SqlxPostRepository::boxed(pool.clone());
        let users = SqlxUserRepository::boxed(pool.clone());
        let groups = SqlxGroupRepository::boxed(pool.clone());
        let follows = Arc::new(FollowService::new(users.clone(), SqlxFollowRepository::boxed(pool.clone())));
        Fixture {
            service: FeedService::new(posts.clone(), groups.clone(), users.clone(), follows, &config),
            pool,
            posts,
            users,
            groups,
        }
    }

    async fn setup() -> Fixture {
        setup_with(FeedConfig::default()).await
    }

    impl Fixture {
        async fn user(&self, name: &str) -> User {
            self.users
                .create(&User::new(name.to_string(), "h".to_string()))
                .await
                .unwrap()
        }

        async fn group(&self, slug: &str) -> Group {
            self.groups
                .create(&CreateGroupInput {
                    title: slug.to_uppercase(),
                    slug: slug.to_string(),
                    description: String::new(),
                })
                .await
                .unwrap()
        }

        async fn post(&self, author: &User, text: &str, group: Option<&Group>, minutes_ago: i64) -> Post {
            let mut post = Post::new(author.id, text.to_string(), group.map(|g| g.id), None);
            post.created_at = Utc::now() - Duration::minutes(minutes_ago);
            self.posts.create(&post).await.unwrap()
        }
    }

    fn texts(feed: &Feed) -> Vec<&str> {
        feed.page.items.iter().map(|v| v.post.text.as_str()).collect()
    }

    #[tokio::test]
    async fn test_global_feed_newest_first() {
        let f = setup().await;
        let author = f.user("leo").await;
        f.post(&author, "older", None, 5).await;
        f.post(&author, "newer", None, 1).await;

        let feed = f.service.get_feed(&FeedContext::Global, None, 1).await.unwrap();
        assert_eq!(texts(&feed), vec!["newer", "older"]);
        assert!(matches!(feed.subject, FeedSubject::Global));
    }

    #[tokio::test]
    async fn test_thirteen_posts_paginate_ten_and_three() {
        let f = setup().await;
        let author = f.user("leo").await;
        for i in 0..13 {
            f.post(&author, &format!("post {}", i), None, i).await;
        }

        let first = f.service.get_feed(&FeedContext::Global, None, 1).await.unwrap();
        assert_eq!(first.page.items.len(), 10);
        assert_eq!(first.page.total, 13);
        assert_eq!(first.page.num_pages, 2);

        let second = f.service.get_feed(&FeedContext::Global, None, 2).await.unwrap();
        assert_eq!(second.page.items.len(), 3);
        assert_eq!(second.page.page, 2);
    }

    #[tokio::test]
    async fn test_out_of_range_pages_are_clamped() {
        let f = setup().await;
        let author = f.user("leo").await;
        for i in 0..13 {
            f.post(&author, &format!("post {}", i), None, i).await;
        }

        let beyond = f.service.get_feed(&FeedContext::Global, None, 50).await.unwrap();
        assert_eq!(beyond.page.page, 2);
        assert_eq!(beyond.page.items.len(), 3);

        let below = f.service.get_feed(&FeedContext::Global, None, -1).await.unwrap();
        assert_eq!(below.page.page, 1);
        assert_eq!(below.page.items.len(), 10);
    }

    #[tokio::test]
    async fn test_empty_feed_has_one_empty_page() {
        let f = setup().await;
        let feed = f.service.get_feed(&FeedContext::Global, None, 3).await.unwrap();
        assert_eq!(feed.page.page, 1);
        assert_eq!(feed.page.num_pages, 1);
        assert!(feed.page.is_empty());
    }

    #[tokio::test]
    async fn test_group_feed_only_shows_group_posts() {
        let f = setup().await;
        let author = f.user("leo").await;
        let cats = f.group("cats").await;
        f.post(&author, "cat post", Some(&cats), 2).await;
        f.post(&author, "loose post", None, 1).await;

        let feed = f
            .service
            .get_feed(&FeedContext::Group("cats".to_string()), None, 1)
            .await
            .unwrap();
        assert_eq!(texts(&feed), vec!["cat post"]);
        assert!(matches!(feed.subject, FeedSubject::Group(ref g) if g.slug == "cats"));
    }

    #[tokio::test]
    async fn test_unfiltered_group_feed_shows_everything() {
        let f = setup_with(FeedConfig {
            unfiltered_group_feed: true,
            ..FeedConfig::default()
        })
        .await;
        let author = f.user("leo").await;
        let cats = f.group("cats").await;
        f.post(&author, "cat post", Some(&cats), 2).await;
        f.post(&author, "loose post", None, 1).await;

        let feed = f
            .service
            .get_feed(&FeedContext::Group("cats".to_string()), None, 1)
            .await
            .unwrap();
        assert_eq!(texts(&feed), vec!["loose post", "cat post"]);

        // An unknown slug is still rejected
        assert!(matches!(
            f.service.get_feed(&FeedContext::Group("dogs".to_string()), None, 1).await,
            Err(FeedError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_group_is_not_found() {
        let f = setup().await;
        let result = f
            .service
            .get_feed(&FeedContext::Group("nope".to_string()), None, 1)
            .await;
        assert!(matches!(result, Err(FeedError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_author_feed_and_following_flag() {
        let f = setup().await;
        let reader = f.user("reader").await;
        let writer = f.user("writer").await;
        f.post(&writer, "by writer", None, 2).await;
        f.post(&reader, "by reader", None, 1).await;

        let context = FeedContext::Author("writer".to_string());
        let feed = f.service.get_feed(&context, Some(&reader), 1).await.unwrap();
        assert_eq!(texts(&feed), vec!["by writer"]);
        assert!(matches!(feed.subject, FeedSubject::Author { following: false, .. }));

        SqlxFollowRepository::new(f.pool.clone())
            .create(reader.id, writer.id)
            .await
            .unwrap();
        let feed = f.service.get_feed(&context, Some(&reader), 1).await.unwrap();
        assert!(matches!(feed.subject, FeedSubject::Author { following: true, .. }));

        let anonymous = f.service.get_feed(&context, None, 1).await.unwrap();
        assert!(matches!(anonymous.subject, FeedSubject::Author { following: false, .. }));
    }

    #[tokio::test]
    async fn test_unknown_author_is_not_found() {
        let f = setup().await;
        let result = f
            .service
            .get_feed(&FeedContext::Author("ghost".to_string()), None, 1)
            .await;
        assert!(matches!(result, Err(FeedError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_followed_feed_requires_viewer() {
        let f = setup().await;
        let result = f.service.get_feed(&FeedContext::FollowedAuthors, None, 1).await;
        assert!(matches!(result, Err(FeedError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_followed_feed_shows_only_followed_authors() {
        let f = setup().await;
        let a = f.user("a").await;
        let b = f.user("b").await;
        let c = f.user("c").await;
        SqlxFollowRepository::new(f.pool.clone()).create(a.id, b.id).await.unwrap();

        f.post(&b, "from b", None, 0).await;
        f.post(&c, "from c", None, 0).await;

        let feed_a = f.service.get_feed(&FeedContext::FollowedAuthors, Some(&a), 1).await.unwrap();
        assert_eq!(texts(&feed_a), vec!["from b"]);

        // c follows nobody
        let feed_c = f.service.get_feed(&FeedContext::FollowedAuthors, Some(&c), 1).await.unwrap();
        assert!(feed_c.page.is_empty());
    }
}
