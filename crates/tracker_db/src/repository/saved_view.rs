use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use tracing::info;

use tracker_core::models::activity::ActivityFilter;
use tracker_core::models::saved_view::{ChartOptions, NewSavedView, SavedView};

use crate::error::Result;
use crate::retry::retry_on_conflict;

#[derive(FromRow)]
struct SavedViewRow {
    id: i64,
    owner: String,
    name: String,
    description: Option<String>,
    filters: Json<ActivityFilter>,
    charts: Json<ChartOptions>,
    is_default: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<SavedViewRow> for SavedView {
    fn from(row: SavedViewRow) -> Self {
        SavedView {
            id: row.id,
            owner: row.owner,
            name: row.name,
            description: row.description,
            filter: row.filters.0,
            charts: row.charts.0,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Dashboard views, always scoped to their owner: another user's view is
/// indistinguishable from a missing one.
pub struct SavedViewRepository {
    pool: SqlitePool,
}

impl SavedViewRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the view, or replaces the owner's view of the same name.
    /// A new default clears the owner's previous default.
    pub async fn save(&self, owner: &str, view: &NewSavedView) -> Result<SavedView> {
        let saved = retry_on_conflict("saved_view.save", move || async move {
            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;
            if view.is_default {
                sqlx::query("UPDATE saved_dashboard_views SET is_default = 0 WHERE owner = ?")
                    .bind(owner)
                    .execute(&mut *tx)
                    .await?;
            }
            let row: SavedViewRow = sqlx::query_as(
                r#"
                INSERT INTO saved_dashboard_views
                (owner, name, description, filters, charts, is_default, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (owner, name) DO UPDATE SET
                    description = excluded.description,
                    filters = excluded.filters,
                    charts = excluded.charts,
                    is_default = excluded.is_default,
                    updated_at = excluded.updated_at
                RETURNING *
                "#,
            )
            .bind(owner)
            .bind(&view.name)
            .bind(&view.description)
            .bind(Json(&view.filter))
            .bind(Json(&view.charts))
            .bind(view.is_default)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(SavedView::from(row))
        })
        .await?;
        info!(owner, id = saved.id, name = %saved.name, "dashboard view saved");
        Ok(saved)
    }

    /// The owner's views, most recently saved first.
    pub async fn list(&self, owner: &str) -> Result<Vec<SavedView>> {
        let rows: Vec<SavedViewRow> = sqlx::query_as(
            r#"
            SELECT * FROM saved_dashboard_views
            WHERE owner = ?
            ORDER BY updated_at DESC, id DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SavedView::from).collect())
    }

    pub async fn get(&self, owner: &str, id: i64) -> Result<Option<SavedView>> {
        let row: Option<SavedViewRow> =
            sqlx::query_as("SELECT * FROM saved_dashboard_views WHERE id = ? AND owner = ?")
                .bind(id)
                .bind(owner)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(SavedView::from))
    }

    /// Returns whether the owner had such a view.
    pub async fn delete(&self, owner: &str, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM saved_dashboard_views WHERE id = ? AND owner = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
