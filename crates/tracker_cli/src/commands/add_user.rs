use anyhow::{Context, Result};
use clap::Args;
use tracker_core::access::Role;
use tracker_core::models::user::NewUser;
use tracker_service::TrackerService;

#[derive(Debug, Args)]
pub struct AddUserArgs {
    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub full_name: String,

    /// system_admin, data_manager, activity_manager, viewer or user_manager
    #[arg(long)]
    pub role: String,

    /// Cluster codes the user is assigned to (repeatable)
    #[arg(long = "cluster")]
    pub clusters: Vec<String>,
}

/// Runs with operator rights: no acting user is needed, so the first
/// administrator can be created on an empty database.
pub async fn execute(service: &TrackerService, args: AddUserArgs) -> Result<()> {
    let role: Role = args
        .role
        .parse()
        .with_context(|| format!("Unknown role '{}'", args.role))?;
    let clusters = service.cluster_ids(&args.clusters).await?;
    let user = service
        .add_user(&NewUser {
            username: args.username,
            full_name: args.full_name,
            role,
            clusters,
        })
        .await?;
    println!("👤 Added {} ({}) as {}", user.username, user.full_name, user.role);
    Ok(())
}
