use tracing::{debug, info};

use tracker_core::access::{Operation, Principal, Resource};
use tracker_core::models::activity::ActivityFilter;
use tracker_core::models::saved_view::{NewSavedView, SavedView};
use tracker_core::reporting::{summarize, DashboardSummary};
use tracker_db::repository::{ActivityRepository, SavedViewRepository};

use crate::error::{Error, Result};
use crate::TrackerService;

impl TrackerService {
    /// Totals over the activities the caller may see. No match is an
    /// all-zero summary.
    pub async fn dashboard(&self, caller: &Principal, filter: &ActivityFilter) -> Result<DashboardSummary> {
        caller.authorize(Resource::Dashboard, Operation::View)?;
        let views = ActivityRepository::new(self.pool.clone())
            .list(filter, &caller.visibility())
            .await?;
        debug!(user = %caller.username, activities = views.len(), "dashboard computed");
        Ok(summarize(&views))
    }

    /// Stores the caller's filters under a name, replacing any view of
    /// theirs with the same name.
    pub async fn save_dashboard_view(&self, caller: &Principal, view: &NewSavedView) -> Result<SavedView> {
        caller.authorize(Resource::Dashboard, Operation::View)?;
        let view = view.normalized()?;
        Ok(SavedViewRepository::new(self.pool.clone())
            .save(&caller.username, &view)
            .await?)
    }

    pub async fn list_dashboard_views(&self, caller: &Principal) -> Result<Vec<SavedView>> {
        caller.authorize(Resource::Dashboard, Operation::View)?;
        Ok(SavedViewRepository::new(self.pool.clone())
            .list(&caller.username)
            .await?)
    }

    /// One of the caller's views. Other users' views are not found.
    pub async fn get_dashboard_view(&self, caller: &Principal, id: i64) -> Result<SavedView> {
        caller.authorize(Resource::Dashboard, Operation::View)?;
        SavedViewRepository::new(self.pool.clone())
            .get(&caller.username, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("dashboard view {}", id)))
    }

    pub async fn delete_dashboard_view(&self, caller: &Principal, id: i64) -> Result<()> {
        caller.authorize(Resource::Dashboard, Operation::View)?;
        if !SavedViewRepository::new(self.pool.clone())
            .delete(&caller.username, id)
            .await?
        {
            return Err(Error::NotFound(format!("dashboard view {}", id)));
        }
        info!(user = %caller.username, id, "dashboard view deleted");
        Ok(())
    }

    /// The dashboard under a saved view's filters, still limited to what the
    /// caller may see today.
    pub async fn saved_dashboard(&self, caller: &Principal, id: i64) -> Result<DashboardSummary> {
        let view = self.get_dashboard_view(caller, id).await?;
        self.dashboard(caller, &view.filter).await
    }
}
