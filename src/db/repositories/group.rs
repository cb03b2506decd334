//! Group repository

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{CreateGroupInput, Group};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Group repository trait
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Create a new group
    async fn create(&self, input: &CreateGroupInput) -> Result<Group>;

    /// Get group by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Group>>;

    /// Get group by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>>;

    /// List all groups ordered by title
    async fn list(&self) -> Result<Vec<Group>>;

    /// Delete a group. Its posts stay, ungrouped.
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based group repository implementation
pub struct SqlxGroupRepository {
    pool: DynDatabasePool,
}

impl SqlxGroupRepository {
    /// Create a new SQLx group repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn GroupRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl GroupRepository for SqlxGroupRepository {
    async fn create(&self, input: &CreateGroupInput) -> Result<Group> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_group_sqlite(sqlite(&self.pool)?, input).await,
            DatabaseDriver::Mysql => create_group_mysql(mysql(&self.pool)?, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Group>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query("SELECT id, title, slug, description FROM post_groups WHERE id = ?")
                    .bind(id)
                    .fetch_optional(sqlite(&self.pool)?)
                    .await
                    .context("Failed to get group by ID")?;
                Ok(row.as_ref().map(row_to_group_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query("SELECT id, title, slug, description FROM post_groups WHERE id = ?")
                    .bind(id)
                    .fetch_optional(mysql(&self.pool)?)
                    .await
                    .context("Failed to get group by ID")?;
                Ok(row.as_ref().map(row_to_group_mysql))
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query("SELECT id, title, slug, description FROM post_groups WHERE slug = ?")
                    .bind(slug)
                    .fetch_optional(sqlite(&self.pool)?)
                    .await
                    .context("Failed to get group by slug")?;
                Ok(row.as_ref().map(row_to_group_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query("SELECT id, title, slug, description FROM post_groups WHERE slug = ?")
                    .bind(slug)
                    .fetch_optional(mysql(&self.pool)?)
                    .await
                    .context("Failed to get group by slug")?;
                Ok(row.as_ref().map(row_to_group_mysql))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Group>> {
        let sql = "SELECT id, title, slug, description FROM post_groups ORDER BY title, id";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(sql)
                    .fetch_all(sqlite(&self.pool)?)
                    .await
                    .context("Failed to list groups")?;
                Ok(rows.iter().map(row_to_group_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(sql)
                    .fetch_all(mysql(&self.pool)?)
                    .await
                    .context("Failed to list groups")?;
                Ok(rows.iter().map(row_to_group_mysql).collect())
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM post_groups WHERE id = ?")
                    .bind(id)
                    .execute(sqlite(&self.pool)?)
                    .await
                    .context("Failed to delete group")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM post_groups WHERE id = ?")
                    .bind(id)
                    .execute(mysql(&self.pool)?)
                    .await
                    .context("Failed to delete group")?;
            }
        }
        Ok(())
    }
}

async fn create_group_sqlite(pool: &SqlitePool, input: &CreateGroupInput) -> Result<Group> {
    let result = sqlx::query("INSERT INTO post_groups (title, slug, description) VALUES (?, ?, ?)")
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.description)
        .execute(pool)
        .await
        .context("Failed to create group")?;

    Ok(Group {
        id: result.last_insert_rowid(),
        title: input.title.clone(),
        slug: input.slug.clone(),
        description: input.description.clone(),
    })
}

async fn create_group_mysql(pool: &MySqlPool, input: &CreateGroupInput) -> Result<Group> {
    let result = sqlx::query("INSERT INTO post_groups (title, slug, description) VALUES (?, ?, ?)")
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.description)
        .execute(pool)
        .await
        .context("Failed to create group")?;

    Ok(Group {
        id: result.last_insert_id() as i64,
        title: input.title.clone(),
        slug: input.slug.clone(),
        description: input.description.clone(),
    })
}

fn row_to_group_sqlite(row: &sqlx::sqlite::SqliteRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}

fn row_to_group_mysql(row: &sqlx::mysql::MySqlRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxGroupRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxGroupRepository::new(pool)
    }

    fn input(title: &str, slug: &str) -> CreateGroupInput {
        CreateGroupInput {
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("About {}", title),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_by_slug() {
        let repo = setup_test_repo().await;
        let created = repo.create(&input("Cats", "cats")).await.unwrap();

        let found = repo.get_by_slug("cats").await.unwrap().expect("group");
        assert_eq!(found, created);
        assert_eq!(repo.get_by_id(created.id).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_unknown_slug() {
        let repo = setup_test_repo().await;
        assert!(repo.get_by_slug("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_slug_is_unique() {
        let repo = setup_test_repo().await;
        repo.create(&input("Cats", "cats")).await.unwrap();
        assert!(repo.create(&input("Other cats", "cats")).await.is_err());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let repo = setup_test_repo().await;
        let dogs = repo.create(&input("Dogs", "dogs")).await.unwrap();
        repo.create(&input("Cats", "cats")).await.unwrap();

        let titles: Vec<String> = repo.list().await.unwrap().into_iter().map(|g| g.title).collect();
        assert_eq!(titles, vec!["Cats", "Dogs"]);

        repo.delete(dogs.id).await.unwrap();
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
