use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::models::activity::ActivityFilter;

pub const MAX_NAME_LEN: usize = 100;

/// Dashboard charts a saved view shows. All are on unless switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartOptions {
    pub year: bool,
    pub status: bool,
    pub cluster: bool,
    pub funder: bool,
    pub quarter: bool,
    pub month: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            year: true,
            status: true,
            cluster: true,
            funder: true,
            quarter: true,
            month: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Saved dashboard view: a named filter set belonging to one user. Names are
// unique per owner; saving under an existing name replaces that view. At most
// one view per owner is the default.
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedView {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub filter: ActivityFilter,
    pub charts: ChartOptions,
    pub is_default: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewSavedView {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub filter: ActivityFilter,
    #[serde(default)]
    pub charts: ChartOptions,
    #[serde(default)]
    pub is_default: bool,
}

fn trimmed(raw: &Option<String>) -> Option<String> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

impl NewSavedView {
    /// Trims every text field, drops blank filter values and checks the name.
    pub fn normalized(&self) -> Result<NewSavedView> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("name: is required".into()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(Error::Validation(format!("name: must be at most {} characters", MAX_NAME_LEN)));
        }
        Ok(NewSavedView {
            name: name.to_string(),
            description: trimmed(&self.description),
            filter: ActivityFilter {
                year: self.filter.year,
                cluster: trimmed(&self.filter.cluster),
                funder: trimmed(&self.filter.funder),
                status: trimmed(&self.filter.status),
            },
            charts: self.charts,
            is_default: self.is_default,
        })
    }
}
