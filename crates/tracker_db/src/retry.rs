use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

pub const MAX_ATTEMPTS: u32 = 8;
const FIRST_DELAY: Duration = Duration::from_millis(5);

/// Re-runs `op` while it fails with `AllocationConflict`, backing off
/// exponentially. Each attempt must open its own transaction.
pub async fn retry_on_conflict<T, F, Fut>(label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = FIRST_DELAY;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(Error::AllocationConflict(reason)) if attempt < MAX_ATTEMPTS => {
                warn!(label, attempt, %reason, "write conflict, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            other => return other,
        }
    }
}
