use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

// ---------------------------------------------------------------------------
// Activity: one planned piece of work for a planning year.
// The id is allocated by the store and never reused; retired activities stay
// in the table.
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// `Y{YY}-{NNNNNN}`
    pub id: String,
    pub name: String,
    pub planning_year: i32,
    pub cluster_id: i64,
    pub funder_id: i64,
    pub status_id: i64,
    pub currency_id: i64,
    pub responsible_officer: Option<String>,
    /// Always the last calendar day of the planned month.
    pub planned_month: Date,
    pub quarter: u8,
    pub actual_start_date: Option<Date>,
    pub actual_completion_date: Option<Date>,
    pub fully_implemented_by: Option<String>,
    pub planned_budget: Decimal,
    pub disbursed_amount: Option<Decimal>,
    pub notes: Option<String>,
    pub retired: bool,
    pub created_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Activity {
    /// Planned budget minus disbursed; nothing disbursed counts as zero.
    pub fn balance(&self) -> Decimal {
        self.planned_budget - self.disbursed_amount.unwrap_or_default()
    }
}

/// A validated activity ready to be inserted. The id is assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub name: String,
    pub planning_year: i32,
    pub cluster_id: i64,
    pub funder_id: i64,
    pub status_id: i64,
    pub currency_id: i64,
    pub responsible_officer: Option<String>,
    pub planned_month: Date,
    pub planned_budget: Decimal,
    pub disbursed_amount: Option<Decimal>,
    pub notes: Option<String>,
}

/// An activity joined with the display values of its references.
///
/// Master entries are joined regardless of their active flag, so a
/// deactivated cluster still shows its name on old records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: Activity,
    pub cluster_code: String,
    pub cluster_name: String,
    pub funder_code: String,
    pub funder_name: String,
    pub status_name: String,
    pub currency_code: String,
    pub balance: Decimal,
}

/// Partial update of an activity. Reference fields take a master code or
/// name; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityUpdate {
    pub name: Option<String>,
    pub cluster: Option<String>,
    pub funder: Option<String>,
    pub currency: Option<String>,
    pub planned_month: Option<String>,
    pub planned_budget: Option<Decimal>,
    pub disbursed_amount: Option<Decimal>,
    pub responsible_officer: Option<String>,
    pub notes: Option<String>,
    pub actual_start_date: Option<Date>,
    pub actual_completion_date: Option<Date>,
    pub fully_implemented_by: Option<String>,
}

/// Criteria for listing, dashboards and exports. Codes are matched exactly;
/// status is matched by name, case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub year: Option<i32>,
    pub cluster: Option<String>,
    pub funder: Option<String>,
    pub status: Option<String>,
}
