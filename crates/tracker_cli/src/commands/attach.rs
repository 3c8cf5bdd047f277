use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracker_core::access::Principal;
use tracker_core::models::attachment::DocumentType;
use tracker_service::attachments::AttachmentUpload;
use tracker_service::TrackerService;

#[derive(Debug, Args)]
pub struct AttachArgs {
    /// Activity id, e.g. Y26-000001
    #[arg(short, long)]
    pub id: String,

    /// Path to the document (pdf, docx or xlsx)
    #[arg(short, long)]
    pub file: PathBuf,

    /// report, proposal, contract, invoice, receipt or other
    #[arg(short = 't', long = "type")]
    pub document_type: String,

    #[arg(short, long)]
    pub description: Option<String>,
}

pub async fn execute(service: &TrackerService, caller: &Principal, args: AttachArgs) -> Result<()> {
    let document_type: DocumentType = args
        .document_type
        .parse()
        .with_context(|| format!("Unknown document type '{}'", args.document_type))?;
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let filename = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let attachment = service
        .upload_attachment(
            caller,
            AttachmentUpload {
                activity_id: args.id,
                document_type,
                filename,
                description: args.description,
                bytes,
            },
        )
        .await?;
    println!(
        "📎 Attached {} to {} as {} v{} ({})",
        attachment.filename, attachment.activity_id, attachment.document_type, attachment.version, attachment.id
    );
    Ok(())
}
