use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tracker_cli::commands::{self, acting_user};
use tracker_core::access::Principal;
use tracker_service::{Config, TrackerService};

#[derive(Parser)]
#[command(name = "tracker")]
#[command(about = "Activity tracker administration", long_about = None)]
struct Cli {
    /// Username to act as (falls back to TRACKER_USER)
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the database schema from embedded assets
    Rebuild(commands::rebuild::RebuildArgs),

    /// Load master data from a CSV file
    Seed(commands::seed::SeedArgs),

    /// Register a user
    AddUser(commands::add_user::AddUserArgs),

    /// Import activities from a spreadsheet
    Upload(commands::upload::UploadArgs),

    /// Write the upload template
    Template(commands::template::TemplateArgs),

    /// Export activities to a spreadsheet
    Export(commands::export::ExportArgs),

    /// Attach a document to an activity
    Attach(commands::attach::AttachArgs),

    /// Print dashboard totals
    Dashboard(commands::dashboard::DashboardArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Rebuild(args) => commands::rebuild::execute(&config, args).await,
        Commands::AddUser(args) => {
            let service = TrackerService::from_config(&config).await?;
            commands::add_user::execute(&service, args).await
        }
        Commands::Seed(args) => {
            let (service, caller) = session(&config, cli.user).await?;
            commands::seed::execute(&service, &caller, args).await
        }
        Commands::Upload(args) => {
            let (service, caller) = session(&config, cli.user).await?;
            commands::upload::execute(&service, &caller, args).await
        }
        Commands::Template(args) => {
            let (service, _) = session(&config, cli.user).await?;
            commands::template::execute(&service, args).await
        }
        Commands::Export(args) => {
            let (service, caller) = session(&config, cli.user).await?;
            commands::export::execute(&service, &caller, args).await
        }
        Commands::Attach(args) => {
            let (service, caller) = session(&config, cli.user).await?;
            commands::attach::execute(&service, &caller, args).await
        }
        Commands::Dashboard(args) => {
            let (service, caller) = session(&config, cli.user).await?;
            commands::dashboard::execute(&service, &caller, args).await
        }
    }
}

/// Opens the service and resolves the user the command acts as.
async fn session(config: &Config, user: Option<String>) -> Result<(TrackerService, Principal)> {
    let service = TrackerService::from_config(config).await?;
    let caller = acting_user(&service, user).await?;
    Ok((service, caller))
}
