use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::access::{Principal, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub active: bool,
    /// Cluster ids the user works in; drives row visibility for
    /// cluster-scoped roles.
    pub clusters: Vec<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal {
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
            clusters: self.clusters.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub clusters: Vec<i64>,
}
