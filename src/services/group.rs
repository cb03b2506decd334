//! Group service
//!
//! Groups have no pages for editing them; they are created here by
//! operators and tests.

use crate::db::repositories::GroupRepository;
use crate::models::{CreateGroupInput, Group};
use anyhow::Context;
use std::sync::Arc;

/// Maximum slug length
const MAX_SLUG_LENGTH: usize = 100;

/// Error types for group operations
#[derive(Debug, thiserror::Error)]
pub enum GroupServiceError {
    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Another group already uses the slug
    #[error("Slug already in use: {0}")]
    SlugTaken(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Group service
pub struct GroupService {
    groups: Arc<dyn GroupRepository>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupRepository>) -> Self {
        Self { groups }
    }

    /// Create a group with a unique slug
    pub async fn create(&self, input: CreateGroupInput) -> Result<Group, GroupServiceError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(GroupServiceError::ValidationError("Title cannot be empty".to_string()));
        }
        let slug = input.slug.trim();
        if !is_valid_slug(slug) {
            return Err(GroupServiceError::ValidationError(format!(
                "Invalid slug '{}': use lowercase letters, digits, '-' and '_'",
                slug
            )));
        }

        if self
            .groups
            .get_by_slug(slug)
            .await
            .context("Failed to check slug")?
            .is_some()
        {
            return Err(GroupServiceError::SlugTaken(slug.to_string()));
        }

        let group = self
            .groups
            .create(&CreateGroupInput {
                title: title.to_string(),
                slug: slug.to_string(),
                description: input.description.trim().to_string(),
            })
            .await
            .context("Failed to create group")?;
        tracing::info!("Group '{}' created", group.slug);
        Ok(group)
    }

    /// All groups, for the post form's group choices
    pub async fn list(&self) -> Result<Vec<Group>, GroupServiceError> {
        Ok(self.groups.list().await.context("Failed to list groups")?)
    }
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LENGTH
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxGroupRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> GroupService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        GroupService::new(SqlxGroupRepository::boxed(pool))
    }

    fn input(title: &str, slug: &str) -> CreateGroupInput {
        CreateGroupInput {
            title: title.to_string(),
            slug: slug.to_string(),
            description: "  about  ".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_group() {
        let service = setup().await;
        let group = service.create(input(" Cats ", "cats")).await.unwrap();
        assert_eq!(group.title, "Cats");
        assert_eq!(group.description, "about");
        assert_eq!(service.list().await.unwrap(), vec![group]);
    }

    #[tokio::test]
    async fn test_duplicate_slug() {
        let service = setup().await;
        service.create(input("Cats", "cats")).await.unwrap();
        assert!(matches!(
            service.create(input("More cats", "cats")).await,
            Err(GroupServiceError::SlugTaken(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let service = setup().await;
        assert!(matches!(
            service.create(input("", "cats")).await,
            Err(GroupServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(input("Cats", "Big Cats")).await,
            Err(GroupServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn test_slug_rules() {
        assert!(is_valid_slug("cats-and_dogs2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("Cats"));
        assert!(!is_valid_slug(&"a".repeat(101)));
    }
}
