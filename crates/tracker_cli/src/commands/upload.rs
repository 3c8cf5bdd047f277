use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracker_core::access::Principal;
use tracker_service::TrackerService;

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Spreadsheet to import (.xlsx or .csv)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Planning year the rows belong to
    #[arg(short, long)]
    pub year: i32,
}

pub async fn execute(service: &TrackerService, caller: &Principal, args: UploadArgs) -> Result<()> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let file_name = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let summary = service.bulk_upload(caller, args.year, &file_name, &bytes).await?;
    println!("Batch: {}", summary.batch_id);
    println!("Accepted: {}", summary.accepted_count);
    println!("Updated: {}", summary.updated_count);
    println!("Rejected: {}", summary.rejected_count);
    for id in &summary.activity_ids {
        println!("  + {}", id);
    }
    for id in &summary.updated_ids {
        println!("  ~ {}", id);
    }
    for error in &summary.errors {
        println!("  ! row {} {}: {}", error.row, error.field, error.reason);
    }
    Ok(())
}
