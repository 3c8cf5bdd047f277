use rust_xlsxwriter::{Color, DataValidation, Format, Formula, Workbook, Worksheet};
use tracing::info;

use tracker_core::models::master_data::{MasterEntry, MasterKind};
use tracker_db::repository::MasterDataRepository;

use crate::error::Result;
use crate::TrackerService;

pub const TEMPLATE_SHEET: &str = "Activities";
pub const LISTS_SHEET: &str = "Lists";
pub const TEMPLATE_FILE_NAME: &str = "activity_upload_template.xlsx";

pub const TEMPLATE_HEADERS: [&str; 10] = [
    "Activity Name",
    "Cluster",
    "Funder",
    "Planned Implementation Month",
    "Budget Amount",
    "Disbursed Amount",
    "Currency",
    "Implementation Status",
    "Responsible Officer",
    "Key Notes",
];

/// Last template row (1-based) that carries dropdowns.
const LAST_DATA_ROW: u32 = 1000;

/// Dropdown columns: template column, master kind, column letter on the
/// lists sheet.
const DROPDOWNS: [(u16, MasterKind, &str); 4] = [
    (1, MasterKind::Cluster, "A"),
    (2, MasterKind::Funder, "B"),
    (7, MasterKind::Status, "C"),
    (6, MasterKind::Currency, "D"),
];

/// Builds the upload template from the given active entries.
pub fn build_template(entries: &[MasterEntry]) -> Result<Vec<u8>> {
    let header_format = Format::new().set_bold().set_background_color(Color::RGB(0xD9E1F2));
    let unlocked = Format::new().set_unlocked();

    let mut sheet = Worksheet::new();
    sheet.set_name(TEMPLATE_SHEET)?;
    for (col, title) in TEMPLATE_HEADERS.iter().enumerate() {
        let col = col as u16;
        sheet.set_column_width(col, 24)?;
        sheet.set_column_format(col, &unlocked)?;
        sheet.write_string_with_format(0, col, *title, &header_format)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    let mut lists = Worksheet::new();
    lists.set_name(LISTS_SHEET)?;

    for (col, (template_col, kind, letter)) in DROPDOWNS.iter().enumerate() {
        let codes: Vec<&str> = entries
            .iter()
            .filter(|e| e.kind == *kind && e.active)
            .map(|e| e.code.as_str())
            .collect();
        lists.write_string(0, col as u16, TEMPLATE_HEADERS[*template_col as usize])?;
        for (i, code) in codes.iter().enumerate() {
            lists.write_string(i as u32 + 1, col as u16, *code)?;
        }
        if codes.is_empty() {
            continue;
        }

        let source = format!("={}!${}$2:${}${}", LISTS_SHEET, letter, letter, codes.len() + 1);
        let validation = DataValidation::new().allow_list_formula(Formula::new(source));
        sheet.add_data_validation(1, *template_col, LAST_DATA_ROW - 1, *template_col, &validation)?;
    }
    lists.set_hidden(true);
    sheet.protect();

    let mut workbook = Workbook::new();
    workbook.push_worksheet(sheet);
    workbook.push_worksheet(lists);
    Ok(workbook.save_to_buffer()?)
}

impl TrackerService {
    /// Any signed-in user may fetch the template; the dropdowns only ever
    /// offer active master data.
    pub async fn upload_template(&self) -> Result<Vec<u8>> {
        let entries = MasterDataRepository::new(self.pool.clone()).all_active().await?;
        let bytes = build_template(&entries)?;
        info!(size = bytes.len(), "upload template generated");
        Ok(bytes)
    }
}
