use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracker_service::template::TEMPLATE_FILE_NAME;
use tracker_service::TrackerService;

#[derive(Debug, Args)]
pub struct TemplateArgs {
    /// Where to write the template
    #[arg(short, long, default_value = TEMPLATE_FILE_NAME)]
    pub output: PathBuf,
}

pub async fn execute(service: &TrackerService, args: TemplateArgs) -> Result<()> {
    let bytes = service.upload_template().await?;
    tokio::fs::write(&args.output, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!("📄 Template written to {}", args.output.display());
    Ok(())
}
