use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook};
use tracing::{info, instrument};

use tracker_core::access::{Operation, Principal, Resource};
use tracker_core::models::activity::{ActivityFilter, ActivityView};
use tracker_db::repository::ActivityRepository;

use crate::error::Result;
use crate::TrackerService;

pub const EXPORT_SHEET: &str = "Activities";

pub const EXPORT_HEADERS: [&str; 14] = [
    "Activity ID",
    "Activity Name",
    "Year",
    "Cluster",
    "Funder",
    "Status",
    "Planned Implementation Month",
    "Quarter",
    "Budget Amount",
    "Disbursed Amount",
    "Balance",
    "Currency",
    "Responsible Officer",
    "Key Notes",
];

/// A generated file ready to be handed to the caller.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// `Aug-2026`, a spelling the upload parser accepts back.
fn month_label(view: &ActivityView) -> String {
    let month = view.activity.planned_month.month().to_string();
    format!("{}-{}", &month[..3], view.activity.planned_month.year())
}

fn amount(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

pub fn build_export(views: &[ActivityView]) -> Result<Vec<u8>> {
    let header_format = Format::new().set_bold();
    let money = Format::new().set_num_format("#,##0.00");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(EXPORT_SHEET)?;
    for (col, title) in EXPORT_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header_format)?;
        sheet.set_column_width(col as u16, 18)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    for (index, view) in views.iter().enumerate() {
        let row = index as u32 + 1;
        let a = &view.activity;
        sheet.write_string(row, 0, &a.id)?;
        sheet.write_string(row, 1, &a.name)?;
        sheet.write_number(row, 2, a.planning_year)?;
        sheet.write_string(row, 3, &view.cluster_code)?;
        sheet.write_string(row, 4, &view.funder_code)?;
        sheet.write_string(row, 5, &view.status_name)?;
        sheet.write_string(row, 6, month_label(view))?;
        sheet.write_string(row, 7, format!("Q{}", a.quarter))?;
        sheet.write_number_with_format(row, 8, amount(a.planned_budget), &money)?;
        if let Some(disbursed) = a.disbursed_amount {
            sheet.write_number_with_format(row, 9, amount(disbursed), &money)?;
        }
        sheet.write_number_with_format(row, 10, amount(view.balance), &money)?;
        sheet.write_string(row, 11, &view.currency_code)?;
        if let Some(officer) = &a.responsible_officer {
            sheet.write_string(row, 12, officer)?;
        }
        if let Some(notes) = &a.notes {
            sheet.write_string(row, 13, notes)?;
        }
    }
    Ok(workbook.save_to_buffer()?)
}

impl TrackerService {
    /// Exports the visible, non-retired activities matching `filter`.
    #[instrument(skip(self, caller), fields(user = %caller.username))]
    pub async fn export_activities(&self, caller: &Principal, filter: &ActivityFilter) -> Result<ExportFile> {
        caller.authorize(Resource::Activity, Operation::Export)?;
        let views = ActivityRepository::new(self.pool.clone())
            .list(filter, &caller.visibility())
            .await?;
        let bytes = build_export(&views)?;
        info!(rows = views.len(), "activities exported");

        let file_name = match filter.year {
            Some(year) => format!("activities_{}.xlsx", year),
            None => "activities.xlsx".to_string(),
        };
        Ok(ExportFile { file_name, bytes })
    }
}
