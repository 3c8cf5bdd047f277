use sqlx::types::Json;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use tracker_core::models::activity::{Activity, NewActivity};
use tracker_core::models::audit::{AuditAction, NewAuditEntry};
use tracker_core::models::upload_batch::{BatchReport, BatchRow, FieldError, RowOutcome, UploadBatch};

use crate::error::{Error, Result};
use crate::repository::{activity, audit, parse_stored};
use crate::retry::retry_on_conflict;

#[derive(FromRow)]
struct BatchRecord {
    id: Uuid,
    planning_year: i32,
    file_name: String,
    uploaded_by: String,
    created_at: OffsetDateTime,
    completed_at: Option<OffsetDateTime>,
    accepted_count: i64,
    updated_count: i64,
    rejected_count: i64,
}

impl From<BatchRecord> for UploadBatch {
    fn from(r: BatchRecord) -> Self {
        UploadBatch {
            id: r.id,
            planning_year: r.planning_year,
            file_name: r.file_name,
            uploaded_by: r.uploaded_by,
            created_at: r.created_at,
            completed_at: r.completed_at,
            accepted_count: r.accepted_count,
            updated_count: r.updated_count,
            rejected_count: r.rejected_count,
        }
    }
}

#[derive(FromRow)]
struct BatchRowRecord {
    row_number: i64,
    outcome: String,
    activity_id: Option<String>,
    errors: Json<Vec<FieldError>>,
}

impl TryFrom<BatchRowRecord> for BatchRow {
    type Error = Error;

    fn try_from(r: BatchRowRecord) -> Result<Self> {
        Ok(BatchRow {
            row_number: u32::try_from(r.row_number)
                .map_err(|_| Error::Database(format!("row number {} out of range", r.row_number)))?,
            outcome: parse_stored("row outcome", &r.outcome)?,
            activity_id: r.activity_id,
            errors: r.errors.0,
        })
    }
}

async fn insert_row(
    conn: &mut SqliteConnection,
    batch_id: Uuid,
    row_number: u32,
    outcome: RowOutcome,
    activity_id: Option<&str>,
    errors: &[FieldError],
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO upload_batch_rows (batch_id, row_number, outcome, activity_id, errors)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(batch_id)
    .bind(i64::from(row_number))
    .bind(outcome.as_ref())
    .bind(activity_id)
    .bind(Json(errors.to_vec()))
    .execute(conn)
    .await?;
    Ok(())
}

async fn load_rows(conn: &mut SqliteConnection, batch_id: Uuid) -> Result<Vec<BatchRow>> {
    let records: Vec<BatchRowRecord> = sqlx::query_as(
        r#"
        SELECT row_number, outcome, activity_id, errors
        FROM upload_batch_rows
        WHERE batch_id = ?
        ORDER BY row_number
        "#,
    )
    .bind(batch_id)
    .fetch_all(conn)
    .await?;
    records.into_iter().map(BatchRow::try_from).collect()
}

async fn load_batch(conn: &mut SqliteConnection, batch_id: Uuid) -> Result<Option<UploadBatch>> {
    let record: Option<BatchRecord> = sqlx::query_as(
        r#"
        SELECT id, planning_year, file_name, uploaded_by, created_at, completed_at,
               accepted_count, updated_count, rejected_count
        FROM upload_batches
        WHERE id = ?
        "#,
    )
    .bind(batch_id)
    .fetch_optional(conn)
    .await?;
    Ok(record.map(UploadBatch::from))
}

pub struct UploadBatchRepository {
    pool: SqlitePool,
}

impl UploadBatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, planning_year: i32, file_name: &str, uploaded_by: &str) -> Result<UploadBatch> {
        let batch = UploadBatch {
            id: Uuid::now_v7(),
            planning_year,
            file_name: file_name.to_string(),
            uploaded_by: uploaded_by.to_string(),
            created_at: OffsetDateTime::now_utc(),
            completed_at: None,
            accepted_count: 0,
            updated_count: 0,
            rejected_count: 0,
        };
        sqlx::query(
            r#"
            INSERT INTO upload_batches (id, planning_year, file_name, uploaded_by, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(batch.id)
        .bind(batch.planning_year)
        .bind(&batch.file_name)
        .bind(&batch.uploaded_by)
        .bind(batch.created_at)
        .execute(&self.pool)
        .await?;
        Ok(batch)
    }

    /// Inserts the activity for an accepted row, its outcome row and its audit
    /// entry as one unit. A failure leaves none of them behind.
    #[instrument(skip(self, new, actor))]
    pub async fn commit_accepted(
        &self,
        batch_id: Uuid,
        row_number: u32,
        new: &NewActivity,
        actor: &str,
    ) -> Result<Activity> {
        retry_on_conflict("upload.row", move || async move {
            let mut tx = self.pool.begin().await?;
            let created = activity::insert(&mut tx, new, actor, Some(batch_id)).await?;
            insert_row(&mut tx, batch_id, row_number, RowOutcome::Accepted, Some(created.id.as_str()), &[]).await?;
            let entry = NewAuditEntry::new(actor, AuditAction::ActivityCreated, &created.id)
                .with_detail(format!("Activity \"{}\" created from upload row {}", created.name, row_number));
            audit::record(&mut tx, &entry).await?;
            tx.commit().await?;
            Ok(created)
        })
        .await
    }

    /// Stores the new values of an existing activity named by a row, with its
    /// outcome row and audit entry, as one unit.
    #[instrument(skip(self, activity, actor), fields(id = %activity.id))]
    pub async fn commit_updated(
        &self,
        batch_id: Uuid,
        row_number: u32,
        activity: &Activity,
        actor: &str,
    ) -> Result<Activity> {
        retry_on_conflict("upload.update", move || async move {
            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;
            activity::store(&mut tx, activity, now).await?;
            insert_row(&mut tx, batch_id, row_number, RowOutcome::Updated, Some(activity.id.as_str()), &[]).await?;
            let entry = NewAuditEntry::new(actor, AuditAction::ActivityUpdated, &activity.id)
                .with_detail(format!("Activity \"{}\" updated from upload row {}", activity.name, row_number));
            audit::record(&mut tx, &entry).await?;
            tx.commit().await?;
            let mut updated = activity.clone();
            updated.updated_at = now;
            Ok(updated)
        })
        .await
    }

    pub async fn record_rejected(&self, batch_id: Uuid, row_number: u32, errors: &[FieldError]) -> Result<()> {
        retry_on_conflict("upload.reject", move || async move {
            let mut conn = self.pool.acquire().await?;
            insert_row(&mut conn, batch_id, row_number, RowOutcome::Rejected, None, errors).await
        })
        .await
    }

    /// Seals the batch. Counts are computed from the stored outcome rows.
    pub async fn finalize(&self, batch_id: Uuid, actor: &str) -> Result<BatchReport> {
        let report = retry_on_conflict("upload.finalize", move || async move {
            let mut tx = self.pool.begin().await?;
            let result = sqlx::query(
                r#"
                UPDATE upload_batches
                SET accepted_count = (SELECT COUNT(*) FROM upload_batch_rows
                                      WHERE batch_id = ? AND outcome = 'accepted'),
                    updated_count  = (SELECT COUNT(*) FROM upload_batch_rows
                                      WHERE batch_id = ? AND outcome = 'updated'),
                    rejected_count = (SELECT COUNT(*) FROM upload_batch_rows
                                      WHERE batch_id = ? AND outcome = 'rejected'),
                    completed_at = ?
                WHERE id = ? AND completed_at IS NULL
                "#,
            )
            .bind(batch_id)
            .bind(batch_id)
            .bind(batch_id)
            .bind(OffsetDateTime::now_utc())
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(Error::NotFound(format!("open upload batch {}", batch_id)));
            }

            let batch = load_batch(&mut tx, batch_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("upload batch {}", batch_id)))?;
            let rows = load_rows(&mut tx, batch_id).await?;
            let entry = NewAuditEntry::new(actor, AuditAction::UploadCompleted, batch_id.to_string()).with_detail(
                format!(
                    "\"{}\" for {}: {} accepted, {} updated, {} rejected",
                    batch.file_name,
                    batch.planning_year,
                    batch.accepted_count,
                    batch.updated_count,
                    batch.rejected_count
                ),
            );
            audit::record(&mut tx, &entry).await?;
            tx.commit().await?;
            Ok(BatchReport { batch, rows })
        })
        .await?;
        info!(
            batch = %batch_id,
            accepted = report.batch.accepted_count,
            updated = report.batch.updated_count,
            rejected = report.batch.rejected_count,
            "upload batch completed"
        );
        Ok(report)
    }

    /// A batch with its rows. Counts of a batch that was never completed are
    /// taken from the rows stored so far.
    pub async fn get_report(&self, batch_id: Uuid) -> Result<Option<BatchReport>> {
        let mut conn = self.pool.acquire().await?;
        let Some(mut batch) = load_batch(&mut conn, batch_id).await? else {
            return Ok(None);
        };
        let rows = load_rows(&mut conn, batch_id).await?;
        if batch.completed_at.is_none() {
            batch.tally(&rows);
        }
        Ok(Some(BatchReport { batch, rows }))
    }
}
