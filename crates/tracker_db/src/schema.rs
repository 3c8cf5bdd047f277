use rust_embed::RustEmbed;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{Error, Result};

#[derive(RustEmbed)]
#[folder = "schema/"]
struct SchemaAssets;

const MANIFEST: &str = "00_build_order.sql";

/// Reads the build order and applies all SQL files in a single transaction.
/// Every statement is idempotent, so this also runs on an existing database.
pub async fn rebuild_database(pool: &SqlitePool) -> Result<()> {
    let script = assemble_script()?;
    let mut tx = pool.begin().await?;
    sqlx::raw_sql(&script).execute(&mut *tx).await?;
    tx.commit().await?;
    info!("schema applied");
    Ok(())
}

/// Concatenates the files named by `-- @include` lines, in manifest order.
pub fn assemble_script() -> Result<String> {
    let manifest = get_file_content(MANIFEST)?;
    let mut full_script = String::new();

    for line in manifest.lines() {
        let trimmed = line.trim();

        if let Some(path) = parse_include_directive(trimmed) {
            debug!(path, "including schema file");
            full_script.push_str(&get_file_content(path)?);
            full_script.push('\n');
        } else if !trimmed.starts_with("--") {
            full_script.push_str(line);
            full_script.push('\n');
        }
    }
    Ok(full_script)
}

fn get_file_content(path: &str) -> Result<String> {
    let file = SchemaAssets::get(path)
        .ok_or_else(|| Error::Database(format!("missing schema file: {}", path)))?;
    String::from_utf8(file.data.into_owned())
        .map_err(|e| Error::Database(format!("schema file {} is not UTF-8: {}", path, e)))
}

fn parse_include_directive(line: &str) -> Option<&str> {
    if line.starts_with("--") && line.contains("@include") {
        line.split_whitespace().last()
    } else {
        None
    }
}
