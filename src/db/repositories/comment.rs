//! Comment repository

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentWithAuthor, CreateCommentInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Comments on a post, oldest first
    async fn list_by_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    /// Create a new SQLx comment repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_SQL: &str = r#"
    SELECT c.id, c.post_id, c.author_id, c.text, c.created_at, u.username AS author_username
    FROM comments c
    INNER JOIN users u ON u.id = c.author_id
    WHERE c.post_id = ?
    ORDER BY c.created_at ASC, c.id ASC
"#;

const INSERT_SQL: &str = "INSERT INTO comments (post_id, author_id, text, created_at) VALUES (?, ?, ?, ?)";

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_SQL)
                .bind(input.post_id)
                .bind(input.author_id)
                .bind(&input.text)
                .bind(now)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to create comment")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_SQL)
                .bind(input.post_id)
                .bind(input.author_id)
                .bind(&input.text)
                .bind(now)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to create comment")?
                .last_insert_id() as i64,
        };

        Ok(Comment {
            id,
            post_id: input.post_id,
            author_id: input.author_id,
            text: input.text.clone(),
            created_at: now,
        })
    }

    async fn list_by_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(LIST_SQL)
                    .bind(post_id)
                    .fetch_all(sqlite(&self.pool)?)
                    .await
                    .context("Failed to list comments")?;
                Ok(rows
                    .iter()
                    .map(|row| CommentWithAuthor {
                        comment: Comment {
                            id: row.get("id"),
                            post_id: row.get("post_id"),
                            author_id: row.get("author_id"),
                            text: row.get("text"),
                            created_at: row.get("created_at"),
                        },
                        author_username: row.get("author_username"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(LIST_SQL)
                    .bind(post_id)
                    .fetch_all(mysql(&self.pool)?)
                    .await
                    .context("Failed to list comments")?;
                Ok(rows
                    .iter()
                    .map(|row| CommentWithAuthor {
                        comment: Comment {
                            id: row.get("id"),
                            post_id: row.get("post_id"),
                            author_id: row.get("author_id"),
                            text: row.get("text"),
                            created_at: row.get("created_at"),
                        },
                        author_username: row.get("author_username"),
                    })
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{PostRepository, SqlxPostRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Post, User};

    async fn setup() -> (DynDatabasePool, SqlxCommentRepository, User, Post) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("leo".to_string(), "h".to_string()))
            .await
            .unwrap();
        let post = SqlxPostRepository::new(pool.clone())
            .create(&Post::new(user.id, "hello".to_string(), None, None))
            .await
            .unwrap();
        (pool.clone(), SqlxCommentRepository::new(pool), user, post)
    }

    fn input(post: &Post, user: &User, text: &str) -> CreateCommentInput {
        CreateCommentInput {
            post_id: post.id,
            author_id: user.id,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_comments_are_oldest_first() {
        let (_pool, repo, user, post) = setup().await;

        repo.create(&input(&post, &user, "first")).await.unwrap();
        repo.create(&input(&post, &user, "second")).await.unwrap();

        let comments = repo.list_by_post(post.id).await.unwrap();
        let texts: Vec<&str> = comments.iter().map(|c| c.comment.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(comments[0].author_username, "leo");
    }

    #[tokio::test]
    async fn test_deleting_post_removes_comments() {
        let (pool, repo, user, post) = setup().await;
        repo.create(&input(&post, &user, "gone soon")).await.unwrap();

        SqlxPostRepository::new(pool).delete(post.id).await.unwrap();
        assert!(repo.list_by_post(post.id).await.unwrap().is_empty());
    }
}
