use sqlx::{FromRow, SqliteConnection, SqlitePool};
use time::OffsetDateTime;
use tracker_core::models::audit::{AuditEntry, NewAuditEntry};

use crate::error::Result;
use crate::repository::parse_stored;

#[derive(FromRow)]
struct AuditRow {
    id: i64,
    username: String,
    action: String,
    record_ref: String,
    detail: Option<String>,
    created_at: OffsetDateTime,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = crate::error::Error;

    fn try_from(row: AuditRow) -> Result<Self> {
        Ok(AuditEntry {
            id: row.id,
            username: row.username,
            action: parse_stored("audit action", &row.action)?,
            record_ref: row.record_ref,
            detail: row.detail,
            created_at: row.created_at,
        })
    }
}

/// Appends an entry on the caller's connection, so it commits or rolls back
/// with the change it describes.
pub async fn record(conn: &mut SqliteConnection, entry: &NewAuditEntry) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO audit_log (username, action, record_ref, detail, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.username)
    .bind(entry.action.as_ref())
    .bind(&entry.record_ref)
    .bind(&entry.detail)
    .bind(OffsetDateTime::now_utc())
    .execute(conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Standalone entry for events with no accompanying write (downloads).
    pub async fn record(&self, entry: &NewAuditEntry) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        record(&mut *conn, entry).await
    }

    /// Entries for one record, newest first.
    pub async fn trail(&self, record_ref: &str) -> Result<Vec<AuditEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, username, action, record_ref, detail, created_at
            FROM audit_log
            WHERE record_ref = ?
            ORDER BY id DESC
            "#,
        )
        .bind(record_ref)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AuditEntry::try_from).collect()
    }
}
