use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};

use tracker_core::access::{Operation, Principal, Resource};
use tracker_core::get_upload_validator;
use tracker_core::identifier::validate_planning_year;
use tracker_core::models::activity::{ActivityFilter, ActivityUpdate, ActivityView};
use tracker_core::models::audit::{AuditAction, AuditEntry, NewAuditEntry};
use tracker_core::models::master_data::MasterKind;
use tracker_core::validation::{apply_update, into_error, ActivityDraft, CellValue};
use tracker_db::repository::{ActivityRepository, AuditRepository};

use crate::error::{Error, Result};
use crate::TrackerService;

/// A single activity as entered through the API or the CLI. Reference fields
/// take a master code or name.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityInput {
    pub name: String,
    pub planning_year: i32,
    pub cluster: String,
    pub funder: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Any accepted month spelling, e.g. `Aug-2026` or `2026-08`.
    pub planned_month: String,
    pub planned_budget: Decimal,
    #[serde(default)]
    pub disbursed_amount: Option<Decimal>,
    #[serde(default)]
    pub responsible_officer: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ActivityInput {
    /// Goes through the same rules as an uploaded row.
    fn to_draft(&self) -> ActivityDraft {
        let text = |raw: &Option<String>| raw.as_deref().map(CellValue::text).unwrap_or_default();
        ActivityDraft {
            name: CellValue::text(self.name.as_str()),
            cluster: CellValue::text(self.cluster.as_str()),
            funder: CellValue::text(self.funder.as_str()),
            planned_month: CellValue::text(self.planned_month.as_str()),
            planned_budget: CellValue::text(self.planned_budget.to_string()),
            disbursed_amount: self
                .disbursed_amount
                .map(|d| CellValue::text(d.to_string()))
                .unwrap_or_default(),
            currency: text(&self.currency),
            status: text(&self.status),
            responsible_officer: text(&self.responsible_officer),
            notes: text(&self.notes),
        }
    }
}

impl TrackerService {
    #[instrument(skip(self, caller, input), fields(user = %caller.username, year = input.planning_year))]
    pub async fn create_activity(&self, caller: &Principal, input: &ActivityInput) -> Result<ActivityView> {
        caller.authorize(Resource::Activity, Operation::Create)?;
        validate_planning_year(input.planning_year)?;

        let ctx = self.validation_context(input.planning_year).await?;
        let new = get_upload_validator()
            .validate(&input.to_draft(), &ctx)
            .map_err(|errors| into_error(&errors))?;
        if !caller.visibility().permits(new.cluster_id) {
            return Err(Error::Permission(format!(
                "{} may not create activities outside their clusters",
                caller.username
            )));
        }

        let created = ActivityRepository::new(self.pool.clone())
            .create(&new, &caller.username)
            .await?;
        self.visible_activity(caller, &created.id, false).await
    }

    pub async fn get_activity(&self, caller: &Principal, id: &str) -> Result<ActivityView> {
        caller.authorize(Resource::Activity, Operation::View)?;
        self.visible_activity(caller, id, false).await
    }

    pub async fn list_activities(&self, caller: &Principal, filter: &ActivityFilter) -> Result<Vec<ActivityView>> {
        caller.authorize(Resource::Activity, Operation::View)?;
        Ok(ActivityRepository::new(self.pool.clone())
            .list(filter, &caller.visibility())
            .await?)
    }

    #[instrument(skip(self, caller, update), fields(user = %caller.username))]
    pub async fn update_activity(
        &self,
        caller: &Principal,
        id: &str,
        update: &ActivityUpdate,
    ) -> Result<ActivityView> {
        caller.authorize(Resource::Activity, Operation::Update)?;
        let existing = self.visible_activity(caller, id, false).await?.activity;

        let ctx = self.validation_context(existing.planning_year).await?;
        let next = apply_update(&existing, update, &ctx).map_err(|errors| into_error(&errors))?;
        if !caller.visibility().permits(next.cluster_id) {
            return Err(Error::Permission(format!(
                "{} may not move activities outside their clusters",
                caller.username
            )));
        }
        if next == existing {
            return self.visible_activity(caller, id, false).await;
        }

        let changed = changed_fields(update);
        let entry = NewAuditEntry::new(&caller.username, AuditAction::ActivityUpdated, id)
            .with_detail(format!("Updated {}", changed.join(", ")));
        ActivityRepository::new(self.pool.clone()).update(&next, &entry).await?;
        info!(id, fields = ?changed, "activity updated");
        self.visible_activity(caller, id, false).await
    }

    #[instrument(skip(self, caller), fields(user = %caller.username))]
    pub async fn change_status(&self, caller: &Principal, id: &str, status: &str) -> Result<ActivityView> {
        caller.authorize(Resource::Activity, Operation::Update)?;
        let current = self.visible_activity(caller, id, false).await?;

        let ctx = self.validation_context(current.activity.planning_year).await?;
        let next = ctx
            .masters
            .resolve(MasterKind::Status, status)
            .ok_or_else(|| Error::ReferentialIntegrity(format!("status: unknown or inactive status '{}'", status)))?;

        let entry = NewAuditEntry::new(&caller.username, AuditAction::ActivityStatusChanged, id).with_detail(
            format!("Status changed from \"{}\" to \"{}\"", current.status_name, next.name),
        );
        ActivityRepository::new(self.pool.clone())
            .change_status(id, next.id, &entry)
            .await?;
        info!(id, status = %next.name, "activity status changed");
        self.visible_activity(caller, id, false).await
    }

    #[instrument(skip(self, caller), fields(user = %caller.username))]
    pub async fn retire_activity(&self, caller: &Principal, id: &str) -> Result<()> {
        caller.authorize(Resource::Activity, Operation::Delete)?;
        let view = self.visible_activity(caller, id, false).await?;
        let entry = NewAuditEntry::new(&caller.username, AuditAction::ActivityRetired, id)
            .with_detail(format!("Activity \"{}\" retired", view.activity.name));
        ActivityRepository::new(self.pool.clone()).retire(id, &entry).await?;
        info!(id, "activity retired");
        Ok(())
    }

    /// Audit entries recorded against the activity, newest first. Retired
    /// activities keep their trail.
    pub async fn audit_trail(&self, caller: &Principal, id: &str) -> Result<Vec<AuditEntry>> {
        caller.authorize(Resource::AuditLog, Operation::View)?;
        self.visible_activity(caller, id, true).await?;
        Ok(AuditRepository::new(self.pool.clone()).trail(id).await?)
    }
}

fn changed_fields(update: &ActivityUpdate) -> Vec<&'static str> {
    let flags = [
        ("name", update.name.is_some()),
        ("cluster", update.cluster.is_some()),
        ("funder", update.funder.is_some()),
        ("currency", update.currency.is_some()),
        ("planned_month", update.planned_month.is_some()),
        ("planned_budget", update.planned_budget.is_some()),
        ("disbursed_amount", update.disbursed_amount.is_some()),
        ("responsible_officer", update.responsible_officer.is_some()),
        ("notes", update.notes.is_some()),
        ("actual_start_date", update.actual_start_date.is_some()),
        ("actual_completion_date", update.actual_completion_date.is_some()),
        ("fully_implemented_by", update.fully_implemented_by.is_some()),
    ];
    flags.into_iter().filter(|(_, set)| *set).map(|(name, _)| name).collect()
}
