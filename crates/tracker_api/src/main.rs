use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use tracker_api::routes::app_router;
use tracker_api::AppState;
use tracker_service::{Config, TrackerService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let service = TrackerService::from_config(&config).await?;
    let app = app_router(AppState::new(service));

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
