use anyhow::{Context, Result};
use clap::Args;
use tracker_service::Config;

#[derive(Debug, Args)]
pub struct RebuildArgs {}

/// Applies the embedded schema. Safe to run against an existing database.
pub async fn execute(config: &Config, _args: RebuildArgs) -> Result<()> {
    println!("🏗️  Rebuilding database schema at {}", config.database_url);
    let pool = tracker_db::connect(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to connect to the database")?;
    tracker_db::rebuild_database(&pool)
        .await
        .context("Failed to apply the database schema")?;
    println!("✅ Schema applied");
    Ok(())
}
