use anyhow::Result;
use clap::Args;
use tracker_core::access::Principal;
use tracker_core::models::activity::ActivityFilter;
use tracker_service::TrackerService;

use super::export::FilterArgs;

#[derive(Debug, Args)]
pub struct DashboardArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Prints the summary as JSON.
pub async fn execute(service: &TrackerService, caller: &Principal, args: DashboardArgs) -> Result<()> {
    let summary = service.dashboard(caller, &ActivityFilter::from(args.filter)).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
