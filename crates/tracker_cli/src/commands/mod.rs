use anyhow::{Context, Result};
use tracker_core::access::Principal;
use tracker_service::TrackerService;

pub mod add_user;
pub mod attach;
pub mod dashboard;
pub mod export;
pub mod rebuild;
pub mod seed;
pub mod template;
pub mod upload;

/// Environment fallback for `--user`.
pub const USER_VAR: &str = "TRACKER_USER";

/// Resolves the acting user from `--user` or `TRACKER_USER`.
pub async fn acting_user(service: &TrackerService, user: Option<String>) -> Result<Principal> {
    let username = match user {
        Some(username) => username,
        None => std::env::var(USER_VAR)
            .with_context(|| format!("pass --user or set {}", USER_VAR))?,
    };
    let principal = service.authenticate(&username).await?;
    Ok(principal)
}
