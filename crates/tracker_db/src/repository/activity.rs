use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use time::{Date, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

use tracker_core::access::Visibility;
use tracker_core::identifier::format_activity_id;
use tracker_core::models::activity::{Activity, ActivityFilter, ActivityView, NewActivity};
use tracker_core::models::audit::{AuditAction, NewAuditEntry};
use tracker_core::period::quarter_of;

use crate::error::{allocation, Error, Result};
use crate::repository::{audit, from_minor, to_minor};
use crate::retry::retry_on_conflict;

#[derive(FromRow)]
pub(crate) struct ActivityRow {
    id: String,
    name: String,
    planning_year: i32,
    cluster_id: i64,
    funder_id: i64,
    status_id: i64,
    currency_id: i64,
    responsible_officer: Option<String>,
    planned_month: Date,
    quarter: i64,
    actual_start_date: Option<Date>,
    actual_completion_date: Option<Date>,
    fully_implemented_by: Option<String>,
    planned_budget_minor: i64,
    disbursed_minor: Option<i64>,
    notes: Option<String>,
    retired: bool,
    created_by: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<ActivityRow> for Activity {
    type Error = Error;

    fn try_from(row: ActivityRow) -> Result<Self> {
        let quarter = u8::try_from(row.quarter)
            .map_err(|_| Error::Database(format!("activity {} has quarter {}", row.id, row.quarter)))?;
        Ok(Activity {
            id: row.id,
            name: row.name,
            planning_year: row.planning_year,
            cluster_id: row.cluster_id,
            funder_id: row.funder_id,
            status_id: row.status_id,
            currency_id: row.currency_id,
            responsible_officer: row.responsible_officer,
            planned_month: row.planned_month,
            quarter,
            actual_start_date: row.actual_start_date,
            actual_completion_date: row.actual_completion_date,
            fully_implemented_by: row.fully_implemented_by,
            planned_budget: from_minor(row.planned_budget_minor),
            disbursed_amount: row.disbursed_minor.map(from_minor),
            notes: row.notes,
            retired: row.retired,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ActivityViewRow {
    #[sqlx(flatten)]
    activity: ActivityRow,
    cluster_code: String,
    cluster_name: String,
    funder_code: String,
    funder_name: String,
    status_name: String,
    currency_code: String,
}

impl TryFrom<ActivityViewRow> for ActivityView {
    type Error = Error;

    fn try_from(row: ActivityViewRow) -> Result<Self> {
        let activity = Activity::try_from(row.activity)?;
        Ok(ActivityView {
            balance: activity.balance(),
            activity,
            cluster_code: row.cluster_code,
            cluster_name: row.cluster_name,
            funder_code: row.funder_code,
            funder_name: row.funder_name,
            status_name: row.status_name,
            currency_code: row.currency_code,
        })
    }
}

// Master rows are joined whatever their active flag, so deactivated entries
// keep displaying on the records that use them.
const VIEW_SELECT: &str = r#"
    SELECT a.*,
           c.code   AS cluster_code,
           c.name   AS cluster_name,
           f.code   AS funder_code,
           f.name   AS funder_name,
           s.name   AS status_name,
           cur.code AS currency_code
    FROM activities a
    JOIN master_data c   ON c.id = a.cluster_id
    JOIN master_data f   ON f.id = a.funder_id
    JOIN master_data s   ON s.id = a.status_id
    JOIN master_data cur ON cur.id = a.currency_id
"#;

/// Takes the next sequence number for `year`.
///
/// This is a write, so when it is the first statement of a transaction the
/// transaction holds the database write lock from here until commit, and no
/// other allocation for any year can interleave.
pub async fn allocate_sequence(conn: &mut SqliteConnection, year: i32) -> Result<i64> {
    let (sequence,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO activity_sequences (planning_year, last_sequence)
        VALUES (?, 1)
        ON CONFLICT (planning_year) DO UPDATE SET last_sequence = last_sequence + 1
        RETURNING last_sequence
        "#,
    )
    .bind(year)
    .fetch_one(conn)
    .await
    .map_err(allocation)?;
    Ok(sequence)
}

/// Allocates an id and inserts the activity on the caller's transaction.
pub async fn insert(
    conn: &mut SqliteConnection,
    new: &NewActivity,
    created_by: &str,
    batch_id: Option<Uuid>,
) -> Result<Activity> {
    let sequence = allocate_sequence(&mut *conn, new.planning_year).await?;
    let id = format_activity_id(new.planning_year, sequence).map_err(|e| Error::Conflict(e.to_string()))?;
    let quarter = quarter_of(new.planned_month);
    let now = OffsetDateTime::now_utc();

    sqlx::query(
        r#"
        INSERT INTO activities
        (id, planning_year, sequence, name, cluster_id, funder_id, status_id, currency_id,
         responsible_officer, planned_month, quarter, planned_budget_minor, disbursed_minor,
         notes, upload_batch_id, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(new.planning_year)
    .bind(sequence)
    .bind(&new.name)
    .bind(new.cluster_id)
    .bind(new.funder_id)
    .bind(new.status_id)
    .bind(new.currency_id)
    .bind(&new.responsible_officer)
    .bind(new.planned_month)
    .bind(i64::from(quarter))
    .bind(to_minor(new.planned_budget)?)
    .bind(new.disbursed_amount.map(to_minor).transpose()?)
    .bind(&new.notes)
    .bind(batch_id)
    .bind(created_by)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(allocation)?;

    Ok(Activity {
        id,
        name: new.name.clone(),
        planning_year: new.planning_year,
        cluster_id: new.cluster_id,
        funder_id: new.funder_id,
        status_id: new.status_id,
        currency_id: new.currency_id,
        responsible_officer: new.responsible_officer.clone(),
        planned_month: new.planned_month,
        quarter,
        actual_start_date: None,
        actual_completion_date: None,
        fully_implemented_by: None,
        planned_budget: new.planned_budget,
        disbursed_amount: new.disbursed_amount,
        notes: new.notes.clone(),
        retired: false,
        created_by: created_by.to_string(),
        created_at: now,
        updated_at: now,
    })
}

/// Writes every editable field of a live activity on the caller's
/// transaction.
pub async fn store(conn: &mut SqliteConnection, activity: &Activity, now: OffsetDateTime) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE activities
        SET name = ?, cluster_id = ?, funder_id = ?, status_id = ?, currency_id = ?,
            responsible_officer = ?, planned_month = ?, quarter = ?, actual_start_date = ?,
            actual_completion_date = ?, fully_implemented_by = ?, planned_budget_minor = ?,
            disbursed_minor = ?, notes = ?, updated_at = ?
        WHERE id = ? AND retired = 0
        "#,
    )
    .bind(&activity.name)
    .bind(activity.cluster_id)
    .bind(activity.funder_id)
    .bind(activity.status_id)
    .bind(activity.currency_id)
    .bind(&activity.responsible_officer)
    .bind(activity.planned_month)
    .bind(i64::from(activity.quarter))
    .bind(activity.actual_start_date)
    .bind(activity.actual_completion_date)
    .bind(&activity.fully_implemented_by)
    .bind(to_minor(activity.planned_budget)?)
    .bind(activity.disbursed_amount.map(to_minor).transpose()?)
    .bind(&activity.notes)
    .bind(now)
    .bind(&activity.id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("activity {}", activity.id)));
    }
    Ok(())
}

pub struct ActivityRepository {
    pool: SqlitePool,
}

impl ActivityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates one activity with a freshly allocated id and its audit entry.
    #[instrument(skip(self, new), fields(year = new.planning_year))]
    pub async fn create(&self, new: &NewActivity, actor: &str) -> Result<Activity> {
        let activity = retry_on_conflict("activity.create", move || self.try_create(new, actor)).await?;
        info!(id = %activity.id, "activity created");
        Ok(activity)
    }

    async fn try_create(&self, new: &NewActivity, actor: &str) -> Result<Activity> {
        let mut tx = self.pool.begin().await?;
        let activity = insert(&mut tx, new, actor, None).await?;
        let entry = NewAuditEntry::new(actor, AuditAction::ActivityCreated, &activity.id)
            .with_detail(format!("Activity \"{}\" created", activity.name));
        audit::record(&mut tx, &entry).await?;
        tx.commit().await?;
        Ok(activity)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Activity>> {
        let row: Option<ActivityRow> = sqlx::query_as("SELECT * FROM activities WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Activity::try_from).transpose()
    }

    pub async fn get_view(&self, id: &str) -> Result<Option<ActivityView>> {
        let mut qb = QueryBuilder::<Sqlite>::new(VIEW_SELECT);
        qb.push(" WHERE a.id = ").push_bind(id.to_string());
        let row: Option<ActivityViewRow> = qb.build_query_as::<ActivityViewRow>().fetch_optional(&self.pool).await?;
        row.map(ActivityView::try_from).transpose()
    }

    /// Non-retired activities matching `filter` that `visibility` allows,
    /// newest planning year first.
    pub async fn list(&self, filter: &ActivityFilter, visibility: &Visibility) -> Result<Vec<ActivityView>> {
        let mut qb = QueryBuilder::<Sqlite>::new(VIEW_SELECT);
        qb.push(" WHERE a.retired = 0");
        if let Some(year) = filter.year {
            qb.push(" AND a.planning_year = ").push_bind(year);
        }
        if let Some(cluster) = &filter.cluster {
            qb.push(" AND c.code = ").push_bind(cluster.clone());
        }
        if let Some(funder) = &filter.funder {
            qb.push(" AND f.code = ").push_bind(funder.clone());
        }
        if let Some(status) = &filter.status {
            qb.push(" AND lower(s.name) = lower(").push_bind(status.clone()).push(")");
        }
        match visibility {
            Visibility::All => {}
            Visibility::Clusters(ids) if ids.is_empty() => {
                qb.push(" AND 0");
            }
            Visibility::Clusters(ids) => {
                qb.push(" AND a.cluster_id IN (");
                let mut separated = qb.separated(", ");
                for id in ids {
                    separated.push_bind(*id);
                }
                separated.push_unseparated(")");
            }
        }
        qb.push(" ORDER BY a.planning_year DESC, a.id");

        let rows: Vec<ActivityViewRow> = qb.build_query_as::<ActivityViewRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(ActivityView::try_from).collect()
    }

    /// Stores every editable field of `activity`.
    pub async fn update(&self, activity: &Activity, entry: &NewAuditEntry) -> Result<Activity> {
        retry_on_conflict("activity.update", move || self.try_update(activity, entry)).await
    }

    async fn try_update(&self, activity: &Activity, entry: &NewAuditEntry) -> Result<Activity> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.pool.begin().await?;
        store(&mut tx, activity, now).await?;
        audit::record(&mut tx, entry).await?;
        tx.commit().await?;

        let mut updated = activity.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    pub async fn change_status(&self, id: &str, status_id: i64, entry: &NewAuditEntry) -> Result<()> {
        retry_on_conflict("activity.status", move || async move {
            let mut tx = self.pool.begin().await?;
            let result = sqlx::query(
                "UPDATE activities SET status_id = ?, updated_at = ? WHERE id = ? AND retired = 0",
            )
            .bind(status_id)
            .bind(OffsetDateTime::now_utc())
            .bind(id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(Error::NotFound(format!("activity {}", id)));
            }
            audit::record(&mut tx, entry).await?;
            tx.commit().await?;
            Ok(())
        })
        .await
    }

    /// Hides the activity from listings. The row and its id stay.
    pub async fn retire(&self, id: &str, entry: &NewAuditEntry) -> Result<()> {
        retry_on_conflict("activity.retire", move || async move {
            let mut tx = self.pool.begin().await?;
            let result = sqlx::query(
                "UPDATE activities SET retired = 1, updated_at = ? WHERE id = ? AND retired = 0",
            )
            .bind(OffsetDateTime::now_utc())
            .bind(id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(Error::NotFound(format!("activity {}", id)));
            }
            audit::record(&mut tx, entry).await?;
            tx.commit().await?;
            Ok(())
        })
        .await
    }
}
