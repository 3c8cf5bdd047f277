use sqlx::{FromRow, SqliteConnection, SqlitePool};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use tracker_core::models::attachment::{Attachment, DocumentType, NewAttachment};
use tracker_core::models::audit::{AuditAction, NewAuditEntry};

use crate::error::{allocation, Error, Result};
use crate::repository::{audit, parse_stored};
use crate::retry::retry_on_conflict;

#[derive(FromRow)]
struct AttachmentRow {
    id: Uuid,
    activity_id: String,
    document_type: String,
    filename: String,
    file_type: String,
    description: Option<String>,
    version: i64,
    file_size: i64,
    checksum: String,
    storage_key: String,
    uploaded_by: String,
    uploaded_at: OffsetDateTime,
    is_latest: bool,
    is_deleted: bool,
}

impl TryFrom<AttachmentRow> for Attachment {
    type Error = Error;

    fn try_from(row: AttachmentRow) -> Result<Self> {
        Ok(Attachment {
            id: row.id,
            document_type: parse_stored("document type", &row.document_type)?,
            file_type: parse_stored("file type", &row.file_type)?,
            activity_id: row.activity_id,
            filename: row.filename,
            description: row.description,
            version: row.version,
            file_size: row.file_size,
            checksum: row.checksum,
            storage_key: row.storage_key,
            uploaded_by: row.uploaded_by,
            uploaded_at: row.uploaded_at,
            is_latest: row.is_latest,
            is_deleted: row.is_deleted,
        })
    }
}

const COLUMNS: &str = "id, activity_id, document_type, filename, file_type, description, version, \
                       file_size, checksum, storage_key, uploaded_by, uploaded_at, is_latest, is_deleted";

async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Attachment>> {
    let row: Option<AttachmentRow> =
        sqlx::query_as(&format!("SELECT {} FROM attachments WHERE id = ?", COLUMNS))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    row.map(Attachment::try_from).transpose()
}

pub struct AttachmentRepository {
    pool: SqlitePool,
}

impl AttachmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Records a new version for (activity, document type) and makes it the
    /// latest, in one transaction with its audit entry.
    #[instrument(skip(self, new), fields(activity = %new.activity_id, doc = %new.document_type))]
    pub async fn insert_version(&self, new: &NewAttachment) -> Result<Attachment> {
        let attachment = retry_on_conflict("attachment.upload", move || self.try_insert_version(new)).await?;
        info!(version = attachment.version, "attachment stored");
        Ok(attachment)
    }

    async fn try_insert_version(&self, new: &NewAttachment) -> Result<Attachment> {
        let mut tx = self.pool.begin().await?;

        // Written first so the transaction owns the write lock before it
        // reads the current maximum version.
        sqlx::query(
            r#"
            UPDATE attachments SET is_latest = 0
            WHERE activity_id = ? AND document_type = ? AND is_latest = 1
            "#,
        )
        .bind(&new.activity_id)
        .bind(new.document_type.as_ref())
        .execute(&mut *tx)
        .await?;

        // Deleted versions count too, so numbers are never reused.
        let (version,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(MAX(version), 0) + 1 FROM attachments
            WHERE activity_id = ? AND document_type = ?
            "#,
        )
        .bind(&new.activity_id)
        .bind(new.document_type.as_ref())
        .fetch_one(&mut *tx)
        .await?;

        let uploaded_at = OffsetDateTime::now_utc();
        sqlx::query(
            r#"
            INSERT INTO attachments
            (id, activity_id, document_type, filename, file_type, description, version,
             file_size, checksum, storage_key, uploaded_by, uploaded_at, is_latest, is_deleted)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 0)
            "#,
        )
        .bind(new.id)
        .bind(&new.activity_id)
        .bind(new.document_type.as_ref())
        .bind(&new.filename)
        .bind(new.file_type.as_ref())
        .bind(&new.description)
        .bind(version)
        .bind(new.file_size)
        .bind(&new.checksum)
        .bind(&new.storage_key)
        .bind(&new.uploaded_by)
        .bind(uploaded_at)
        .execute(&mut *tx)
        .await
        .map_err(allocation)?;

        let entry = NewAuditEntry::new(&new.uploaded_by, AuditAction::AttachmentUploaded, &new.activity_id)
            .with_detail(format!("Document \"{}\" (v{}) uploaded", new.filename, version));
        audit::record(&mut tx, &entry).await?;
        tx.commit().await?;

        Ok(Attachment {
            id: new.id,
            activity_id: new.activity_id.clone(),
            document_type: new.document_type,
            filename: new.filename.clone(),
            file_type: new.file_type,
            description: new.description.clone(),
            version,
            file_size: new.file_size,
            checksum: new.checksum.clone(),
            storage_key: new.storage_key.clone(),
            uploaded_by: new.uploaded_by.clone(),
            uploaded_at,
            is_latest: true,
            is_deleted: false,
        })
    }

    /// Soft-deletes a version. When it was the latest, the highest remaining
    /// version of the same document type takes over.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: Uuid, actor: &str) -> Result<Attachment> {
        retry_on_conflict("attachment.delete", move || self.try_soft_delete(id, actor)).await
    }

    async fn try_soft_delete(&self, id: Uuid, actor: &str) -> Result<Attachment> {
        let mut tx = self.pool.begin().await?;

        let deleted: Option<(String, String, i64, String)> = sqlx::query_as(
            r#"
            UPDATE attachments SET is_deleted = 1, is_latest = 0
            WHERE id = ? AND is_deleted = 0
            RETURNING activity_id, document_type, version, filename
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let (activity_id, document_type, version, filename) =
            deleted.ok_or_else(|| Error::NotFound(format!("attachment {}", id)))?;

        sqlx::query(
            r#"
            UPDATE attachments SET is_latest = 1
            WHERE id = (
                SELECT id FROM attachments
                WHERE activity_id = ? AND document_type = ? AND is_deleted = 0
                ORDER BY version DESC
                LIMIT 1
            )
            AND NOT EXISTS (
                SELECT 1 FROM attachments
                WHERE activity_id = ? AND document_type = ? AND is_deleted = 0 AND is_latest = 1
            )
            "#,
        )
        .bind(&activity_id)
        .bind(&document_type)
        .bind(&activity_id)
        .bind(&document_type)
        .execute(&mut *tx)
        .await?;

        let entry = NewAuditEntry::new(actor, AuditAction::AttachmentDeleted, &activity_id)
            .with_detail(format!("Document \"{}\" (v{}) deleted", filename, version));
        audit::record(&mut tx, &entry).await?;

        let attachment = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("attachment {}", id)))?;
        tx.commit().await?;
        Ok(attachment)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Attachment>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Non-deleted attachments of an activity, by type then newest version.
    pub async fn list_active(&self, activity_id: &str) -> Result<Vec<Attachment>> {
        let rows: Vec<AttachmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM attachments WHERE activity_id = ? AND is_deleted = 0 \
             ORDER BY document_type, version DESC",
            COLUMNS
        ))
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Attachment::try_from).collect()
    }

    /// Every version, deleted ones included, newest first.
    pub async fn history(&self, activity_id: &str, document_type: DocumentType) -> Result<Vec<Attachment>> {
        let rows: Vec<AttachmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM attachments WHERE activity_id = ? AND document_type = ? ORDER BY version DESC",
            COLUMNS
        ))
        .bind(activity_id)
        .bind(document_type.as_ref())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Attachment::try_from).collect()
    }
}
