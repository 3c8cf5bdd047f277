use std::collections::HashMap;

use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;

use tracker_core::models::user::{NewUser, User};

use crate::error::{is_unique_violation, Error, Result};
use crate::repository::parse_stored;

#[derive(FromRow)]
struct UserRow {
    username: String,
    full_name: String,
    role: String,
    active: bool,
    created_at: OffsetDateTime,
}

impl UserRow {
    fn into_user(self, clusters: Vec<i64>) -> Result<User> {
        Ok(User {
            role: parse_stored("role", &self.role)?,
            username: self.username,
            full_name: self.full_name,
            active: self.active,
            clusters,
            created_at: self.created_at,
        })
    }
}

pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: &NewUser) -> Result<User> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO users (username, full_name, role, active, created_at) VALUES (?, ?, ?, 1, ?)",
        )
        .bind(&new.username)
        .bind(&new.full_name)
        .bind(new.role.as_ref())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("user '{}' already exists", new.username))
            } else {
                Error::from(e)
            }
        })?;

        for cluster_id in &new.clusters {
            sqlx::query("INSERT OR IGNORE INTO user_clusters (username, cluster_id) VALUES (?, ?)")
                .bind(&new.username)
                .bind(cluster_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(User {
            username: new.username.clone(),
            full_name: new.full_name.clone(),
            role: new.role,
            active: true,
            clusters: new.clusters.clone(),
            created_at: now,
        })
    }

    pub async fn find_active(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT username, full_name, role, active, created_at FROM users WHERE username = ? AND active = 1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };

        let clusters: Vec<i64> =
            sqlx::query_scalar("SELECT cluster_id FROM user_clusters WHERE username = ? ORDER BY cluster_id")
                .bind(username)
                .fetch_all(&self.pool)
                .await?;
        row.into_user(clusters).map(Some)
    }

    pub async fn list_active(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT username, full_name, role, active, created_at FROM users WHERE active = 1 ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;
        let memberships: Vec<(String, i64)> =
            sqlx::query_as("SELECT username, cluster_id FROM user_clusters ORDER BY username, cluster_id")
                .fetch_all(&self.pool)
                .await?;

        let mut by_user: HashMap<String, Vec<i64>> = HashMap::new();
        for (username, cluster_id) in memberships {
            by_user.entry(username).or_default().push(cluster_id);
        }
        rows.into_iter()
            .map(|row| {
                let clusters = by_user.remove(&row.username).unwrap_or_default();
                row.into_user(clusters)
            })
            .collect()
    }
}
