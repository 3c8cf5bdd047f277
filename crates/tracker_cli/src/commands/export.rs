use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracker_core::access::Principal;
use tracker_core::models::activity::ActivityFilter;
use tracker_service::TrackerService;

#[derive(Debug, Args)]
pub struct FilterArgs {
    #[arg(long)]
    pub year: Option<i32>,

    /// Cluster code or name
    #[arg(long)]
    pub cluster: Option<String>,

    /// Funder code or name
    #[arg(long)]
    pub funder: Option<String>,

    #[arg(long)]
    pub status: Option<String>,
}

impl From<FilterArgs> for ActivityFilter {
    fn from(args: FilterArgs) -> Self {
        ActivityFilter {
            year: args.year,
            cluster: args.cluster,
            funder: args.funder,
            status: args.status,
        }
    }
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Output directory; the file is named after the year
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

pub async fn execute(service: &TrackerService, caller: &Principal, args: ExportArgs) -> Result<()> {
    let filter = ActivityFilter::from(args.filter);
    let file = service.export_activities(caller, &filter).await?;
    let path = args.output.join(&file.file_name);
    tokio::fs::write(&path, &file.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("📦 Export written to {}", path.display());
    Ok(())
}
