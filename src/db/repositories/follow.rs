//! Follow repository
//!
//! Edges of the follower graph. The `(user_id, author_id)` pair is unique in
//! the schema, so inserting an existing edge is ignored rather than failing.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Follow repository trait
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Insert the edge `user_id -> author_id`. Returns `false` if it already existed.
    async fn create(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Remove the edge. Returns `false` if there was none.
    async fn delete(&self, user_id: i64, author_id: i64) -> Result<bool>;

    /// Whether `user_id` follows `author_id`
    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool>;
}

/// SQLx-based follow repository implementation
pub struct SqlxFollowRepository {
    pool: DynDatabasePool,
}

impl SqlxFollowRepository {
    /// Create a new SQLx follow repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FollowRepository for SqlxFollowRepository {
    async fn create(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?, ?)")
                    .bind(user_id)
                    .bind(author_id)
                    .execute(sqlite(&self.pool)?)
                    .await
                    .context("Failed to create follow")?
                    .rows_affected()
            }
            DatabaseDriver::Mysql => {
                sqlx::query("INSERT IGNORE INTO follows (user_id, author_id) VALUES (?, ?)")
                    .bind(user_id)
                    .bind(author_id)
                    .execute(mysql(&self.pool)?)
                    .await
                    .context("Failed to create follow")?
                    .rows_affected()
            }
        };
        Ok(affected > 0)
    }

    async fn delete(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let sql = "DELETE FROM follows WHERE user_id = ? AND author_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .bind(author_id)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to delete follow")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .bind(author_id)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to delete follow")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM follows WHERE user_id = ? AND author_id = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .bind(author_id)
                .fetch_one(sqlite(&self.pool)?)
                .await
                .context("Failed to check follow")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .bind(author_id)
                .fetch_one(mysql(&self.pool)?)
                .await
                .context("Failed to check follow")?
                .get("count"),
        };
        Ok(count > 0)
    }
}
