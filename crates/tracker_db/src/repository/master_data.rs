use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use tracing::info;

use tracker_core::models::audit::{AuditAction, NewAuditEntry};
use tracker_core::models::master_data::{MasterEntry, MasterKind, NewMasterEntry};

use crate::error::{is_unique_violation, Error, Result};
use crate::repository::{audit, parse_stored};
use crate::retry::retry_on_conflict;

#[derive(FromRow)]
struct MasterRow {
    id: i64,
    kind: String,
    code: String,
    name: String,
    active: bool,
    is_default: bool,
    created_at: OffsetDateTime,
}

impl TryFrom<MasterRow> for MasterEntry {
    type Error = Error;

    fn try_from(row: MasterRow) -> Result<Self> {
        Ok(MasterEntry {
            id: row.id,
            kind: parse_stored("master kind", &row.kind)?,
            code: row.code,
            name: row.name,
            active: row.active,
            is_default: row.is_default,
            created_at: row.created_at,
        })
    }
}

pub struct MasterDataRepository {
    pool: SqlitePool,
}

impl MasterDataRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, kind: MasterKind, include_inactive: bool) -> Result<Vec<MasterEntry>> {
        let rows: Vec<MasterRow> = sqlx::query_as(
            r#"
            SELECT id, kind, code, name, active, is_default, created_at
            FROM master_data
            WHERE kind = ? AND (active = 1 OR ?)
            ORDER BY name
            "#,
        )
        .bind(kind.as_ref())
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(MasterEntry::try_from).collect()
    }

    /// Every active entry of every kind; the input for a `MasterIndex`.
    pub async fn all_active(&self) -> Result<Vec<MasterEntry>> {
        let rows: Vec<MasterRow> = sqlx::query_as(
            r#"
            SELECT id, kind, code, name, active, is_default, created_at
            FROM master_data
            WHERE active = 1
            ORDER BY kind, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(MasterEntry::try_from).collect()
    }

    /// Looks an entry up by id whatever its active flag.
    pub async fn get(&self, id: i64) -> Result<Option<MasterEntry>> {
        let row: Option<MasterRow> = sqlx::query_as(
            "SELECT id, kind, code, name, active, is_default, created_at FROM master_data WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(MasterEntry::try_from).transpose()
    }

    pub async fn find_by_code(&self, kind: MasterKind, code: &str) -> Result<Option<MasterEntry>> {
        let row: Option<MasterRow> = sqlx::query_as(
            r#"
            SELECT id, kind, code, name, active, is_default, created_at
            FROM master_data
            WHERE kind = ? AND code = ?
            "#,
        )
        .bind(kind.as_ref())
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(MasterEntry::try_from).transpose()
    }

    /// Adds an entry. A new default replaces the previous default of its kind.
    pub async fn create(&self, new: &NewMasterEntry, actor: &str) -> Result<MasterEntry> {
        let entry = retry_on_conflict("master.create", move || self.try_create(new, actor)).await?;
        info!(kind = %entry.kind, code = %entry.code, "master entry created");
        Ok(entry)
    }

    async fn try_create(&self, new: &NewMasterEntry, actor: &str) -> Result<MasterEntry> {
        let code = new.code.trim();
        let name = new.name.trim();
        let now = OffsetDateTime::now_utc();
        let mut tx = self.pool.begin().await?;

        if new.is_default {
            sqlx::query("UPDATE master_data SET is_default = 0 WHERE kind = ?")
                .bind(new.kind.as_ref())
                .execute(&mut *tx)
                .await?;
        }

        let id = sqlx::query(
            r#"
            INSERT INTO master_data (kind, code, name, active, is_default, created_at)
            VALUES (?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(new.kind.as_ref())
        .bind(code)
        .bind(name)
        .bind(new.is_default)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("{} '{}' already exists", new.kind, code))
            } else {
                Error::from(e)
            }
        })?
        .last_insert_rowid();

        let entry = NewAuditEntry::new(actor, AuditAction::MasterCreated, id.to_string())
            .with_detail(format!("{} \"{}\" created", new.kind, code));
        audit::record(&mut tx, &entry).await?;
        tx.commit().await?;

        Ok(MasterEntry {
            id,
            kind: new.kind,
            code: code.to_string(),
            name: name.to_string(),
            active: true,
            is_default: new.is_default,
            created_at: now,
        })
    }

    /// Marks the entry inactive. Nothing that references it changes.
    pub async fn deactivate(&self, kind: MasterKind, id: i64, actor: &str) -> Result<MasterEntry> {
        retry_on_conflict("master.deactivate", move || async move {
            let mut tx = self.pool.begin().await?;
            let row: Option<MasterRow> = sqlx::query_as(
                r#"
                UPDATE master_data SET active = 0
                WHERE id = ? AND kind = ?
                RETURNING id, kind, code, name, active, is_default, created_at
                "#,
            )
            .bind(id)
            .bind(kind.as_ref())
            .fetch_optional(&mut *tx)
            .await?;
            let entry = MasterEntry::try_from(
                row.ok_or_else(|| Error::NotFound(format!("{} {}", kind, id)))?,
            )?;
            let audit_entry = NewAuditEntry::new(actor, AuditAction::MasterDeactivated, id.to_string())
                .with_detail(format!("{} \"{}\" deactivated", kind, entry.code));
            audit::record(&mut tx, &audit_entry).await?;
            tx.commit().await?;
            Ok(entry)
        })
        .await
    }
}
