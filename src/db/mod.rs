//! Database layer
//!
//! SQLite (default, single file) or MySQL, selected by `database.driver`.
//! Application code only sees the `DatabasePool` trait and the repositories.
//!
//! # Usage
//!
//! ```ignore
//! use inkfeed::config::DatabaseConfig;
//! use inkfeed::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
