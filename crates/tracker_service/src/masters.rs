use serde::Deserialize;
use tracing::{info, instrument, warn};

use tracker_core::access::{Operation, Principal, Resource};
use tracker_core::models::master_data::{MasterEntry, MasterKind, NewMasterEntry};
use tracker_core::models::user::{NewUser, User};
use tracker_db::repository::{MasterDataRepository, UserRepository};

use crate::error::{Error, Result};
use crate::TrackerService;

/// One line of a master data seed file: `kind,code,name,is_default`.
#[derive(Debug, Deserialize)]
struct SeedRecord {
    kind: String,
    code: String,
    name: String,
    #[serde(default)]
    is_default: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
}

impl TrackerService {
    pub async fn list_masters(
        &self,
        caller: &Principal,
        kind: MasterKind,
        include_inactive: bool,
    ) -> Result<Vec<MasterEntry>> {
        caller.authorize(Resource::MasterData, Operation::View)?;
        Ok(MasterDataRepository::new(self.pool.clone())
            .list(kind, include_inactive)
            .await?)
    }

    #[instrument(skip(self, caller, new), fields(user = %caller.username, kind = %new.kind))]
    pub async fn create_master(&self, caller: &Principal, new: &NewMasterEntry) -> Result<MasterEntry> {
        caller.authorize(Resource::MasterData, Operation::Create)?;
        if new.code.trim().is_empty() || new.name.trim().is_empty() {
            return Err(Error::Validation("code and name are required".into()));
        }
        Ok(MasterDataRepository::new(self.pool.clone())
            .create(new, &caller.username)
            .await?)
    }

    /// Existing activities keep pointing at the entry and keep showing it.
    #[instrument(skip(self, caller), fields(user = %caller.username))]
    pub async fn deactivate_master(&self, caller: &Principal, kind: MasterKind, id: i64) -> Result<MasterEntry> {
        caller.authorize(Resource::MasterData, Operation::Update)?;
        let entry = MasterDataRepository::new(self.pool.clone())
            .deactivate(kind, id, &caller.username)
            .await?;
        info!(%kind, code = %entry.code, "master entry deactivated");
        Ok(entry)
    }

    /// Loads master entries from CSV with a `kind,code,name,is_default`
    /// header. Entries whose code already exists are skipped.
    pub async fn seed_masters(&self, caller: &Principal, csv_bytes: &[u8]) -> Result<SeedReport> {
        caller.authorize(Resource::MasterData, Operation::Create)?;
        let repo = MasterDataRepository::new(self.pool.clone());
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(csv_bytes);

        let mut report = SeedReport::default();
        for (index, record) in reader.deserialize::<SeedRecord>().enumerate() {
            let record = record?;
            let kind: MasterKind = record.kind.parse().map_err(|_| {
                Error::Validation(format!("line {}: unknown master kind '{}'", index + 2, record.kind))
            })?;
            let is_default = record
                .is_default
                .as_deref()
                .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "yes" | "1"));
            let new = NewMasterEntry {
                kind,
                code: record.code,
                name: record.name,
                is_default,
            };
            match repo.create(&new, &caller.username).await {
                Ok(_) => report.created += 1,
                Err(tracker_db::Error::Conflict(message)) => {
                    warn!(%message, "seed entry skipped");
                    report.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!(created = report.created, skipped = report.skipped, "master data seeded");
        Ok(report)
    }

    /// Registers a user. Operator-level: reached from the CLI, which runs
    /// with the database owner's rights.
    pub async fn add_user(&self, new: &NewUser) -> Result<User> {
        if new.username.trim().is_empty() || new.full_name.trim().is_empty() {
            return Err(Error::Validation("username and full name are required".into()));
        }
        let masters = MasterDataRepository::new(self.pool.clone());
        for cluster_id in &new.clusters {
            match masters.get(*cluster_id).await? {
                Some(entry) if entry.kind == MasterKind::Cluster && entry.active => {}
                _ => {
                    return Err(Error::ReferentialIntegrity(format!(
                        "cluster {} is unknown or inactive",
                        cluster_id
                    )))
                }
            }
        }
        let user = UserRepository::new(self.pool.clone()).create(new).await?;
        info!(username = %user.username, role = %user.role, "user added");
        Ok(user)
    }

    /// Resolves cluster codes to ids, for callers that name clusters by code.
    pub async fn cluster_ids(&self, codes: &[String]) -> Result<Vec<i64>> {
        let repo = MasterDataRepository::new(self.pool.clone());
        let mut ids = Vec::with_capacity(codes.len());
        for code in codes {
            let entry = repo
                .find_by_code(MasterKind::Cluster, code.trim())
                .await?
                .filter(|e| e.active)
                .ok_or_else(|| Error::ReferentialIntegrity(format!("cluster '{}' is unknown or inactive", code)))?;
            ids.push(entry.id);
        }
        Ok(ids)
    }
}
