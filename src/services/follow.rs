//! Follow graph
//!
//! Directed follower -> author subscriptions. Following is idempotent,
//! unfollowing a non-followed author is a no-op and a user can never
//! follow themselves.

use crate::db::repositories::{FollowRepository, UserRepository};
use crate::models::User;
use anyhow::Context;
use std::sync::Arc;

/// Error types for follow operations
#[derive(Debug, thiserror::Error)]
pub enum FollowError {
    /// No user has the requested username
    #[error("Author not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Follow service
pub struct FollowService {
    users: Arc<dyn UserRepository>,
    follows: Arc<dyn FollowRepository>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UserRepository>, follows: Arc<dyn FollowRepository>) -> Self {
        Self { users, follows }
    }

    /// Make `follower` follow the user named `author_username`.
    ///
    /// Returns the author so callers can redirect to their profile.
    pub async fn follow(&self, follower: &User, author_username: &str) -> Result<User, FollowError> {
        let author = self.find_author(author_username).await?;

        if author.id == follower.id {
            tracing::debug!("Ignoring self-follow by {}", follower.username);
            return Ok(author);
        }

        let created = self
            .follows
            .create(follower.id, author.id)
            .await
            .context("Failed to create follow")?;
        if created {
            tracing::info!("{} now follows {}", follower.username, author.username);
        }

        Ok(author)
    }

    /// Remove the edge `follower -> author_username` if it exists.
    pub async fn unfollow(&self, follower: &User, author_username: &str) -> Result<User, FollowError> {
        let author = self.find_author(author_username).await?;

        let removed = self
            .follows
            .delete(follower.id, author.id)
            .await
            .context("Failed to delete follow")?;
        if removed {
            tracing::info!("{} unfollowed {}", follower.username, author.username);
        }

        Ok(author)
    }

    /// Whether `viewer` follows `author`. Anonymous viewers follow nobody.
    pub async fn is_following(&self, viewer: Option<&User>, author: &User) -> Result<bool, FollowError> {
        let Some(viewer) = viewer else {
            return Ok(false);
        };
        let exists = self
            .follows
            .exists(viewer.id, author.id)
            .await
            .context("Failed to check follow")?;
        Ok(exists)
    }

    async fn find_author(&self, username: &str) -> Result<User, FollowError> {
        self.users
            .get_by_username(username)
            .await
            .context("Failed to get author")?
            .ok_or_else(|| FollowError::NotFound(username.to_string()))
    }
}
