//! CLI tool to create a post group.
//!
//! Usage: `cargo run --bin create-group -- <slug> <title> [description]`
//!
//! Uses the same `config.yml` and `INKFEED_*` overrides as the server.

use anyhow::{bail, Result};
use std::path::Path;

use inkfeed::config::Config;
use inkfeed::db::{self, repositories::SqlxGroupRepository};
use inkfeed::models::CreateGroupInput;
use inkfeed::services::GroupService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkfeed=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(slug), Some(title)) = (args.next(), args.next()) else {
        bail!("usage: create-group <slug> <title> [description]");
    };
    let description = args.collect::<Vec<_>>().join(" ");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let service = GroupService::new(SqlxGroupRepository::boxed(pool));
    let group = service
        .create(CreateGroupInput {
            title,
            slug,
            description,
        })
        .await?;

    println!("Created group '{}' at /group/{}/", group.title, group.slug);
    Ok(())
}
