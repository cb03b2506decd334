//! Post repository
//!
//! Database operations for posts, including the filtered, newest-first
//! listings every feed is built from.
//!
//! Listings order by `created_at DESC, id DESC` so posts sharing a
//! timestamp still come out in a stable order.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{Post, PostFilter, PostView, UpdatePostInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create a new post
    async fn create(&self, post: &Post) -> Result<Post>;

    /// Get post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Get post by ID joined with its author and group
    async fn get_view(&self, id: i64) -> Result<Option<PostView>>;

    /// Update the editable fields of a post
    async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<Option<Post>>;

    /// Delete a post, returning whether it existed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Newest-first slice of the posts selected by `filter`
    async fn list(&self, filter: PostFilter, offset: i64, limit: i64) -> Result<Vec<PostView>>;

    /// Number of posts selected by `filter`
    async fn count(&self, filter: PostFilter) -> Result<i64>;
}

/// SQLx-based post repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    /// Create a new SQLx post repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

const POST_COLUMNS: &str = "id, text, image, group_id, author_id, created_at";

const VIEW_SELECT: &str = r#"
    SELECT p.id, p.text, p.image, p.group_id, p.author_id, p.created_at,
           u.username AS author_username,
           g.title AS group_title,
           g.slug AS group_slug
    FROM posts p
    INNER JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

fn list_sql(filter: PostFilter) -> (String, Option<i64>) {
    let (condition, id) = filter.where_clause();
    let sql = format!(
        "{} {} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
        VIEW_SELECT, condition
    );
    (sql, id)
}

fn count_sql(filter: PostFilter) -> (String, Option<i64>) {
    let (condition, id) = filter.where_clause();
    (format!("SELECT COUNT(*) as count FROM posts p {}", condition), id)
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(sqlite(&self.pool)?, post).await,
            DatabaseDriver::Mysql => create_post_mysql(mysql(&self.pool)?, post).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_by_id_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_post_by_id_mysql(mysql(&self.pool)?, id).await,
        }
    }

    async fn get_view(&self, id: i64) -> Result<Option<PostView>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_view_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_post_view_mysql(mysql(&self.pool)?, id).await,
        }
    }

    async fn update(&self, id: i64, input: &UpdatePostInput) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite(&self.pool)?;
                sqlx::query("UPDATE posts SET text = ?, group_id = ?, image = COALESCE(?, image) WHERE id = ?")
                    .bind(&input.text)
                    .bind(input.group_id)
                    .bind(&input.image)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to update post")?;
                get_post_by_id_sqlite(pool, id).await
            }
            DatabaseDriver::Mysql => {
                let pool = mysql(&self.pool)?;
                sqlx::query("UPDATE posts SET text = ?, group_id = ?, image = COALESCE(?, image) WHERE id = ?")
                    .bind(&input.text)
                    .bind(input.group_id)
                    .bind(&input.image)
                    .bind(id)
                    .execute(pool)
                    .await
                    .context("Failed to update post")?;
                get_post_by_id_mysql(pool, id).await
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, filter: PostFilter, offset: i64, limit: i64) -> Result<Vec<PostView>> {
        let (sql, id) = list_sql(filter);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                if let Some(id) = id {
                    query = query.bind(id);
                }
                let rows = query
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(sqlite(&self.pool)?)
                    .await
                    .context("Failed to list posts")?;
                Ok(rows.iter().map(row_to_view_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                if let Some(id) = id {
                    query = query.bind(id);
                }
                let rows = query
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(mysql(&self.pool)?)
                    .await
                    .context("Failed to list posts")?;
                Ok(rows.iter().map(row_to_view_mysql).collect())
            }
        }
    }

    async fn count(&self, filter: PostFilter) -> Result<i64> {
        let (sql, id) = count_sql(filter);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                if let Some(id) = id {
                    query = query.bind(id);
                }
                let row = query
                    .fetch_one(sqlite(&self.pool)?)
                    .await
                    .context("Failed to count posts")?;
                row.get("count")
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                if let Some(id) = id {
                    query = query.bind(id);
                }
                let row = query
                    .fetch_one(mysql(&self.pool)?)
                    .await
                    .context("Failed to count posts")?;
                row.get("count")
            }
        };
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (text, image, group_id, author_id, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.text)
    .bind(&post.image)
    .bind(post.group_id)
    .bind(post.author_id)
    .bind(post.created_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        ..post.clone()
    })
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    Ok(row.as_ref().map(row_to_post_sqlite))
}

async fn get_post_view_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<PostView>> {
    let sql = format!("{} WHERE p.id = ?", VIEW_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post view")?;

    Ok(row.as_ref().map(row_to_view_sqlite))
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        text: row.get("text"),
        image: row.get("image"),
        group_id: row.get("group_id"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
    }
}

fn row_to_view_sqlite(row: &sqlx::sqlite::SqliteRow) -> PostView {
    PostView {
        post: row_to_post_sqlite(row),
        author_username: row.get("author_username"),
        group_title: row.get("group_title"),
        group_slug: row.get("group_slug"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &Post) -> Result<Post> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (text, image, group_id, author_id, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.text)
    .bind(&post.image)
    .bind(post.group_id)
    .bind(post.author_id)
    .bind(post.created_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        ..post.clone()
    })
}

async fn get_post_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    Ok(row.as_ref().map(row_to_post_mysql))
}

async fn get_post_view_mysql(pool: &MySqlPool, id: i64) -> Result<Option<PostView>> {
    let sql = format!("{} WHERE p.id = ?", VIEW_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post view")?;

    Ok(row.as_ref().map(row_to_view_mysql))
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Post {
    Post {
        id: row.get("id"),
        text: row.get("text"),
        image: row.get("image"),
        group_id: row.get("group_id"),
        author_id: row.get("author_id"),
        created_at: row.get("created_at"),
    }
}

fn row_to_view_mysql(row: &sqlx::mysql::MySqlRow) -> PostView {
    PostView {
        post: row_to_post_mysql(row),
        author_username: row.get("author_username"),
        group_title: row.get("group_title"),
        group_slug: row.get("group_slug"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        FollowRepository, GroupRepository, SqlxFollowRepository, SqlxGroupRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateGroupInput, User};
    use chrono::{Duration, Utc};

    struct Fixture {
        pool: DynDatabasePool,
        repo: SqlxPostRepository,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        Fixture {
            repo: SqlxPostRepository::new(pool.clone()),
            pool,
        }
    }

    async fn user(pool: &DynDatabasePool, name: &str) -> User {
        SqlxUserRepository::new(pool.clone())
            .create(&User::new(name.to_string(), "hash".to_string()))
            .await
            .unwrap()
    }

    /// Post dated `minutes_ago` in the past
    fn dated(author_id: i64, text: &str, group_id: Option<i64>, minutes_ago: i64) -> Post {
        let mut post = Post::new(author_id, text.to_string(), group_id, None);
        post.created_at = Utc::now() - Duration::minutes(minutes_ago);
        post
    }

    #[tokio::test]
    async fn test_create_and_get_view() {
        let f = setup().await;
        let author = user(&f.pool, "leo").await;
        let group = SqlxGroupRepository::new(f.pool.clone())
            .create(&CreateGroupInput {
                title: "Cats".to_string(),
                slug: "cats".to_string(),
                description: String::new(),
            })
            .await
            .unwrap();

        let post = f.repo.create(&dated(author.id, "hello", Some(group.id), 0)).await.unwrap();

        let view = f.repo.get_view(post.id).await.unwrap().expect("view");
        assert_eq!(view.post.text, "hello");
        assert_eq!(view.author_username, "leo");
        assert_eq!(view.group_slug.as_deref(), Some("cats"));
        assert_eq!(view.group_title.as_deref(), Some("Cats"));
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let f = setup().await;
        let author = user(&f.pool, "leo").await;

        f.repo.create(&dated(author.id, "old", None, 30)).await.unwrap();
        f.repo.create(&dated(author.id, "new", None, 1)).await.unwrap();
        f.repo.create(&dated(author.id, "middle", None, 10)).await.unwrap();

        let texts: Vec<String> = f
            .repo
            .list(PostFilter::All, 0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.post.text)
            .collect();
        assert_eq!(texts, vec!["new", "middle", "old"]);
    }

    #[tokio::test]
    async fn test_same_timestamp_falls_back_to_id() {
        let f = setup().await;
        let author = user(&f.pool, "leo").await;
        let mut first = dated(author.id, "first", None, 0);
        let mut second = first.clone();
        second.text = "second".to_string();
        first = f.repo.create(&first).await.unwrap();
        second = f.repo.create(&second).await.unwrap();

        let listed = f.repo.list(PostFilter::All, 0, 10).await.unwrap();
        assert_eq!(listed[0].post.id, second.id);
        assert_eq!(listed[1].post.id, first.id);
    }

    #[tokio::test]
    async fn test_filters_and_counts() {
        let f = setup().await;
        let reader = user(&f.pool, "reader").await;
        let followed = user(&f.pool, "followed").await;
        let stranger = user(&f.pool, "stranger").await;
        let group = SqlxGroupRepository::new(f.pool.clone())
            .create(&CreateGroupInput {
                title: "G".to_string(),
                slug: "g".to_string(),
                description: String::new(),
            })
            .await
            .unwrap();
        SqlxFollowRepository::new(f.pool.clone())
            .create(reader.id, followed.id)
            .await
            .unwrap();

        f.repo.create(&dated(followed.id, "grouped", Some(group.id), 3)).await.unwrap();
        f.repo.create(&dated(followed.id, "loose", None, 2)).await.unwrap();
        f.repo.create(&dated(stranger.id, "elsewhere", None, 1)).await.unwrap();

        assert_eq!(f.repo.count(PostFilter::All).await.unwrap(), 3);
        assert_eq!(f.repo.count(PostFilter::Group(group.id)).await.unwrap(), 1);
        assert_eq!(f.repo.count(PostFilter::Author(stranger.id)).await.unwrap(), 1);
        assert_eq!(f.repo.count(PostFilter::FollowedBy(reader.id)).await.unwrap(), 2);

        let followed_texts: Vec<String> = f
            .repo
            .list(PostFilter::FollowedBy(reader.id), 0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.post.text)
            .collect();
        assert_eq!(followed_texts, vec!["loose", "grouped"]);
    }

    #[tokio::test]
    async fn test_offset_and_limit() {
        let f = setup().await;
        let author = user(&f.pool, "leo").await;
        for i in 0..13 {
            f.repo.create(&dated(author.id, &format!("post {}", i), None, i)).await.unwrap();
        }

        assert_eq!(f.repo.list(PostFilter::All, 0, 10).await.unwrap().len(), 10);
        let tail = f.repo.list(PostFilter::All, 10, 10).await.unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[2].post.text, "post 12");
    }

    #[tokio::test]
    async fn test_update_keeps_author_and_image() {
        let f = setup().await;
        let author = user(&f.pool, "leo").await;
        let mut post = dated(author.id, "draft", None, 0);
        post.image = Some("posts/a.png".to_string());
        let post = f.repo.create(&post).await.unwrap();

        let updated = f
            .repo
            .update(
                post.id,
                &UpdatePostInput {
                    text: "final".to_string(),
                    group_id: None,
                    image: None,
                },
            )
            .await
            .unwrap()
            .expect("post");
        assert_eq!(updated.text, "final");
        assert_eq!(updated.author_id, author.id);
        assert_eq!(updated.image.as_deref(), Some("posts/a.png"));
    }

    #[tokio::test]
    async fn test_delete_post() {
        let f = setup().await;
        let author = user(&f.pool, "leo").await;
        let post = f.repo.create(&dated(author.id, "bye", None, 0)).await.unwrap();

        assert!(f.repo.delete(post.id).await.unwrap());
        assert!(!f.repo.delete(post.id).await.unwrap());
        assert!(f.repo.get_by_id(post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_author_removes_posts() {
        let f = setup().await;
        let author = user(&f.pool, "leo").await;
        f.repo.create(&dated(author.id, "mine", None, 0)).await.unwrap();

        SqlxUserRepository::new(f.pool.clone()).delete(author.id).await.unwrap();
        assert_eq!(f.repo.count(PostFilter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deleting_group_ungroups_posts() {
        let f = setup().await;
        let author = user(&f.pool, "leo").await;
        let groups = SqlxGroupRepository::new(f.pool.clone());
        let group = groups
            .create(&CreateGroupInput {
                title: "G".to_string(),
                slug: "g".to_string(),
                description: String::new(),
            })
            .await
            .unwrap();
        let post = f.repo.create(&dated(author.id, "kept", Some(group.id), 0)).await.unwrap();

        groups.delete(group.id).await.unwrap();
        let post = f.repo.get_by_id(post.id).await.unwrap().expect("post survives");
        assert_eq!(post.group_id, None);
    }
}
