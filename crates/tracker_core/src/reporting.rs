//! Dashboard aggregation over already-filtered, already-visible activities.
//! Pure functions; the caller decides what the viewer is allowed to see.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::activity::ActivityView;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BudgetTotals {
    pub planned: Decimal,
    pub disbursed: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupTotals {
    pub count: i64,
    pub planned: Decimal,
    pub disbursed: Decimal,
}

impl GroupTotals {
    fn add(&mut self, view: &ActivityView) {
        self.count += 1;
        self.planned += view.activity.planned_budget;
        self.disbursed += view.activity.disbursed_amount.unwrap_or_default();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_activities: i64,
    pub implemented_count: i64,
    pub totals: BudgetTotals,
    /// Disbursed as a percentage of planned, two decimals.
    pub execution_rate: Decimal,
    pub by_status: BTreeMap<String, i64>,
    pub by_cluster: BTreeMap<String, GroupTotals>,
    pub by_funder: BTreeMap<String, GroupTotals>,
    pub by_quarter: BTreeMap<String, GroupTotals>,
    /// Keyed by planned month, `YYYY-MM`.
    pub by_month: BTreeMap<String, GroupTotals>,
    pub by_year: BTreeMap<i32, GroupTotals>,
}

impl Default for DashboardSummary {
    fn default() -> Self {
        let by_quarter = (1..=4)
            .map(|q| (format!("Q{q}"), GroupTotals::default()))
            .collect();
        Self {
            total_activities: 0,
            implemented_count: 0,
            totals: BudgetTotals::default(),
            execution_rate: Decimal::ZERO,
            by_status: BTreeMap::new(),
            by_cluster: BTreeMap::new(),
            by_funder: BTreeMap::new(),
            by_quarter,
            by_month: BTreeMap::new(),
            by_year: BTreeMap::new(),
        }
    }
}

/// Fully or partially implemented statuses count as implemented.
pub fn is_implemented(status_name: &str) -> bool {
    let lower = status_name.to_lowercase();
    lower.contains("fully implemented") || lower.contains("partially implemented")
}

fn month_key(view: &ActivityView) -> String {
    let month = view.activity.planned_month;
    format!("{}-{:02}", month.year(), u8::from(month.month()))
}

pub fn summarize(views: &[ActivityView]) -> DashboardSummary {
    let mut summary = DashboardSummary::default();
    for view in views.iter().filter(|v| !v.activity.retired) {
        summary.total_activities += 1;
        if is_implemented(&view.status_name) {
            summary.implemented_count += 1;
        }
        summary.totals.planned += view.activity.planned_budget;
        summary.totals.disbursed += view.activity.disbursed_amount.unwrap_or_default();

        *summary.by_status.entry(view.status_name.clone()).or_default() += 1;
        summary.by_cluster.entry(view.cluster_code.clone()).or_default().add(view);
        summary.by_funder.entry(view.funder_code.clone()).or_default().add(view);
        summary
            .by_quarter
            .entry(format!("Q{}", view.activity.quarter))
            .or_default()
            .add(view);
        summary.by_month.entry(month_key(view)).or_default().add(view);
        summary.by_year.entry(view.activity.planning_year).or_default().add(view);
    }
    summary.totals.balance = summary.totals.planned - summary.totals.disbursed;
    if !summary.totals.planned.is_zero() {
        summary.execution_rate =
            (summary.totals.disbursed * Decimal::ONE_HUNDRED / summary.totals.planned).round_dp(2);
    }
    summary
}
