use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracker_core::access::Principal;
use tracker_service::TrackerService;

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// CSV with a `kind,code,name,is_default` header
    #[arg(short, long)]
    pub file: PathBuf,
}

pub async fn execute(service: &TrackerService, caller: &Principal, args: SeedArgs) -> Result<()> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let report = service.seed_masters(caller, &bytes).await?;
    println!("🌱 Master data seeded: {} created, {} already present", report.created, report.skipped);
    Ok(())
}
