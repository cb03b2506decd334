//! Comment service

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{Comment, CreateCommentInput, User};
use crate::services::forms::{CommentForm, FormErrors};
use anyhow::Context;
use std::sync::Arc;

/// Error types for comment operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    /// The post being commented on does not exist
    #[error("Post not found: {0}")]
    NotFound(i64),

    /// Form input rejected
    #[error("Validation error: {0}")]
    Validation(FormErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Comment service
pub struct CommentService {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
}

impl CommentService {
    pub fn new(posts: Arc<dyn PostRepository>, comments: Arc<dyn CommentRepository>) -> Self {
        Self { posts, comments }
    }

    /// Add a comment by `author` to post `post_id`.
    pub async fn add(
        &self,
        author: &User,
        post_id: i64,
        form: &CommentForm,
    ) -> Result<Comment, CommentServiceError> {
        let exists = self
            .posts
            .get_by_id(post_id)
            .await
            .context("Failed to get post")?
            .is_some();
        if !exists {
            return Err(CommentServiceError::NotFound(post_id));
        }

        let text = form.validate().map_err(CommentServiceError::Validation)?;
        let comment = self
            .comments
            .create(&CreateCommentInput {
                post_id,
                author_id: author.id,
                text,
            })
            .await
            .context("Failed to create comment")?;

        tracing::debug!("Comment {} added to post {} by {}", comment.id, post_id, author.username);
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCommentRepository, SqlxPostRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::Post;

    async fn setup() -> (CommentService, Arc<dyn CommentRepository>, User, Post) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("leo".to_string(), "h".to_string()))
            .await
            .unwrap();
        let posts = SqlxPostRepository::boxed(pool.clone());
        let post = posts
            .create(&Post::new(user.id, "hello".to_string(), None, None))
            .await
            .unwrap();
        let comments = SqlxCommentRepository::boxed(pool);
        (CommentService::new(posts, comments.clone()), comments, user, post)
    }

    #[tokio::test]
    async fn test_add_comment() {
        let (service, comments, user, post) = setup().await;

        let form = CommentForm { text: " nice post ".to_string() };
        let comment = service.add(&user, post.id, &form).await.unwrap();
        assert_eq!(comment.text, "nice post");
        assert_eq!(comment.author_id, user.id);

        let listed = comments.list_by_post(post.id).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_comment_is_not_stored() {
        let (service, comments, user, post) = setup().await;

        let form = CommentForm { text: "   ".to_string() };
        let err = service.add(&user, post.id, &form).await.unwrap_err();
        assert!(matches!(err, CommentServiceError::Validation(_)));
        assert!(comments.list_by_post(post.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comment_on_missing_post() {
        let (service, _comments, user, _post) = setup().await;

        let form = CommentForm { text: "hello?".to_string() };
        assert!(matches!(
            service.add(&user, 999, &form).await,
            Err(CommentServiceError::NotFound(999))
        ));
    }
}
