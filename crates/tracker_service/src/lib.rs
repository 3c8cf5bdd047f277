pub mod activities;
pub mod attachments;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod masters;
pub mod storage;
pub mod template;
pub mod upload;

use std::sync::Arc;

use anyhow::Context;
use sqlx::SqlitePool;
use tracing::info;

use tracker_core::access::Principal;
use tracker_core::models::activity::ActivityView;
use tracker_core::models::master_data::{MasterIndex, MasterKind};
use tracker_core::validation::ValidationContext;
use tracker_db::repository::{ActivityRepository, MasterDataRepository, UserRepository};

pub use config::{Config, Settings, StorageConfig};
pub use error::{Error, Result};
pub use storage::{BlobStore, LocalBlobStore, S3BlobStore};

#[derive(Clone)]
pub struct TrackerService {
    pub pool: SqlitePool,
    pub blobs: Arc<dyn BlobStore>,
    pub settings: Settings,
}

impl TrackerService {
    pub fn new(pool: SqlitePool, blobs: Arc<dyn BlobStore>, settings: Settings) -> Self {
        Self { pool, blobs, settings }
    }

    /// Connects to the database, applies the schema and opens the configured
    /// blob store.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let pool = tracker_db::connect(&config.database_url, config.db_max_connections)
            .await
            .context("Failed to connect to the database")?;
        tracker_db::rebuild_database(&pool)
            .await
            .context("Failed to apply the database schema")?;
        let blobs = storage::from_config(&config.storage)
            .await
            .context("Failed to initialise blob storage")?;
        info!(database = %config.database_url, "tracker service ready");
        Ok(Self::new(pool, Arc::from(blobs), config.settings()))
    }

    /// Resolves a username to the principal requests run as.
    pub async fn authenticate(&self, username: &str) -> Result<Principal> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::Unauthenticated("no user given".into()));
        }
        UserRepository::new(self.pool.clone())
            .find_active(username)
            .await?
            .map(|user| user.principal())
            .ok_or_else(|| Error::Unauthenticated(format!("unknown or inactive user '{}'", username)))
    }

    /// Snapshot of active master data and users for validating new records.
    pub(crate) async fn validation_context(&self, planning_year: i32) -> Result<ValidationContext> {
        let entries = MasterDataRepository::new(self.pool.clone()).all_active().await?;
        let masters = MasterIndex::from_entries(entries)
            .with_default(MasterKind::Currency, &self.settings.default_currency);
        let users = UserRepository::new(self.pool.clone()).list_active().await?;
        Ok(ValidationContext::new(planning_year, masters, &users))
    }

    /// Loads an activity the caller may see. Activities outside the caller's
    /// clusters are reported exactly like missing ones.
    pub(crate) async fn visible_activity(
        &self,
        caller: &Principal,
        id: &str,
        include_retired: bool,
    ) -> Result<ActivityView> {
        let view = ActivityRepository::new(self.pool.clone())
            .get_view(id)
            .await?
            .filter(|v| include_retired || !v.activity.retired)
            .filter(|v| caller.visibility().permits(v.activity.cluster_id));
        view.ok_or_else(|| Error::NotFound(format!("activity {}", id)))
    }
}
