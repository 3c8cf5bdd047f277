use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use tracker_core::access::{Operation, Principal, Resource};
use tracker_core::get_upload_validator;
use tracker_core::identifier::validate_planning_year;
use tracker_core::models::activity::{Activity, ActivityFilter, ActivityView, NewActivity};
use tracker_core::models::master_data::normalize_key;
use tracker_core::models::upload_batch::{BatchReport, FieldError, UploadSummary};
use tracker_core::period::{excel_serial_to_date, quarter_of};
use tracker_core::validation::{fields, rules, ActivityDraft, CellValue, ValidationContext, ValidationEngine};
use tracker_db::repository::{ActivityRepository, UploadBatchRepository};

use crate::error::{Error, Result};
use crate::TrackerService;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Csv,
}

impl SheetFormat {
    pub fn from_filename(file_name: &str) -> Result<Self> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "xlsx" => Ok(SheetFormat::Xlsx),
            "csv" => Ok(SheetFormat::Csv),
            _ => Err(Error::FileConstraint(format!(
                "'{}' is not an .xlsx or .csv file",
                file_name
            ))),
        }
    }
}

/// A data row with its row number as shown by a spreadsheet program.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub row_number: u32,
    /// Set when the row names an existing activity to overwrite.
    pub activity_id: Option<String>,
    pub draft: ActivityDraft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    ActivityId,
    Name,
    Cluster,
    Funder,
    PlannedMonth,
    Budget,
    Disbursed,
    Currency,
    Status,
    Officer,
    Notes,
}

const REQUIRED_COLUMNS: [(Column, &str); 5] = [
    (Column::Name, "Activity Name"),
    (Column::Cluster, "Cluster"),
    (Column::Funder, "Funder"),
    (Column::PlannedMonth, "Planned Implementation Month"),
    (Column::Budget, "Budget Amount"),
];

/// Maps a header cell to the column it feeds. Order matters: "Disbursed
/// Amount" must not be taken for the budget.
fn classify(header: &str) -> Option<Column> {
    let h = normalize_key(header);
    if h.is_empty() {
        None
    } else if h.contains("activity id") || h == "id" {
        Some(Column::ActivityId)
    } else if h.contains("activity name") || h == "name" || h == "activity" {
        Some(Column::Name)
    } else if h.contains("cluster") {
        Some(Column::Cluster)
    } else if h.contains("funder") {
        Some(Column::Funder)
    } else if h.contains("month") {
        Some(Column::PlannedMonth)
    } else if h.contains("disburs") {
        Some(Column::Disbursed)
    } else if h.contains("budget") {
        Some(Column::Budget)
    } else if h.contains("status") {
        Some(Column::Status)
    } else if h.contains("currency") {
        Some(Column::Currency)
    } else if h.contains("responsible") || h.contains("officer") {
        Some(Column::Officer)
    } else if h.contains("note") {
        Some(Column::Notes)
    } else {
        None
    }
}

struct Layout {
    columns: Vec<(usize, Column)>,
}

impl Layout {
    fn from_header(cells: &[CellValue]) -> Result<Self> {
        let mut columns: Vec<(usize, Column)> = Vec::new();
        for (index, cell) in cells.iter().enumerate() {
            let Some(text) = cell.as_text() else { continue };
            if let Some(column) = classify(&text) {
                if !columns.iter().any(|(_, c)| *c == column) {
                    columns.push((index, column));
                }
            }
        }
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .filter(|(column, _)| !columns.iter().any(|(_, c)| c == column))
            .map(|(_, title)| *title)
            .collect();
        if !missing.is_empty() {
            return Err(Error::Validation(format!("missing required columns: {}", missing.join(", "))));
        }
        Ok(Self { columns })
    }

    fn row(&self, row_number: u32, cells: &[CellValue]) -> SheetRow {
        let mut draft = ActivityDraft::default();
        let mut activity_id = None;
        for (index, column) in &self.columns {
            let value = cells.get(*index).cloned().unwrap_or_default();
            let slot = match column {
                Column::ActivityId => {
                    activity_id = value.as_text().map(|id| id.to_ascii_uppercase());
                    continue;
                }
                Column::Name => &mut draft.name,
                Column::Cluster => &mut draft.cluster,
                Column::Funder => &mut draft.funder,
                Column::PlannedMonth => &mut draft.planned_month,
                Column::Budget => &mut draft.planned_budget,
                Column::Disbursed => &mut draft.disbursed_amount,
                Column::Currency => &mut draft.currency,
                Column::Status => &mut draft.status,
                Column::Officer => &mut draft.responsible_officer,
                Column::Notes => &mut draft.notes,
            };
            *slot = value;
        }
        SheetRow { row_number, activity_id, draft }
    }
}

/// Reads the data rows of an uploaded sheet. The first non-empty row is the
/// header; blank rows are skipped.
pub fn parse_sheet(file_name: &str, bytes: &[u8]) -> Result<Vec<SheetRow>> {
    let grid = match SheetFormat::from_filename(file_name)? {
        SheetFormat::Xlsx => read_xlsx(bytes)?,
        SheetFormat::Csv => read_csv(bytes)?,
    };

    let mut rows = grid.into_iter().filter(|(_, cells)| cells.iter().any(|c| !c.is_blank()));
    let (_, header) = rows
        .next()
        .ok_or_else(|| Error::Validation("the sheet has no header row".into()))?;
    let layout = Layout::from_header(&header)?;

    Ok(rows
        .map(|(row_number, cells)| layout.row(row_number, &cells))
        .filter(|row| !row.draft.is_blank())
        .collect())
}

fn read_xlsx(bytes: &[u8]) -> Result<Vec<(u32, Vec<CellValue>)>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Spreadsheet("workbook has no worksheets".into()))??;

    // The used range may not start at A1.
    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let padding = first_col as usize;
    Ok(range
        .rows()
        .enumerate()
        .map(|(offset, row)| {
            let mut cells = vec![CellValue::Empty; padding];
            cells.extend(row.iter().map(cell_value));
            (first_row + offset as u32 + 1, cells)
        })
        .collect())
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
    }
}

fn read_csv(bytes: &[u8]) -> Result<Vec<(u32, Vec<CellValue>)>> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut grid = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        // Quoted fields may span lines; the record's own line is the row.
        let row_number = record
            .position()
            .and_then(|p| u32::try_from(p.line()).ok())
            .unwrap_or(index as u32 + 1);
        let cells = record.iter().map(|field| CellValue::text(field)).collect();
        grid.push((row_number, cells));
    }
    Ok(grid)
}

/// Live activities of the planning year the uploader can see, kept current
/// as rows are stored.
struct YearIndex {
    by_id: HashMap<String, Activity>,
    by_key: HashMap<(String, i64), String>,
}

impl YearIndex {
    fn new(views: Vec<ActivityView>) -> Self {
        let mut index = Self { by_id: HashMap::new(), by_key: HashMap::new() };
        for view in views {
            index.record(&view.activity);
        }
        index
    }

    fn key(name: &str, cluster_id: i64) -> (String, i64) {
        (normalize_key(name), cluster_id)
    }

    /// Id of a live activity with the same name in the same cluster.
    fn duplicate_of(&self, new: &NewActivity) -> Option<&str> {
        self.by_key.get(&Self::key(&new.name, new.cluster_id)).map(String::as_str)
    }

    fn record(&mut self, activity: &Activity) {
        self.by_key.retain(|_, id| *id != activity.id);
        self.by_key
            .insert(Self::key(&activity.name, activity.cluster_id), activity.id.clone());
        self.by_id.insert(activity.id.clone(), activity.clone());
    }
}

/// What to do with one validated row.
enum RowPlan {
    Create(NewActivity),
    Update(Activity),
    Reject(Vec<FieldError>),
}

/// Decides a row's fate against one snapshot of master data and of the
/// year's activities. A row with an Activity ID overwrites that activity;
/// blank optional cells keep its stored values.
fn plan_row(
    row: &SheetRow,
    engine: &ValidationEngine,
    ctx: &ValidationContext,
    index: &YearIndex,
    may_update: bool,
) -> RowPlan {
    let new = match engine.validate(&row.draft, ctx) {
        Ok(new) => new,
        Err(errors) => return RowPlan::Reject(errors),
    };
    let reject = |field: &str, reason: String| RowPlan::Reject(vec![FieldError::new(field, reason)]);

    let Some(id) = &row.activity_id else {
        return match index.duplicate_of(&new) {
            Some(existing) => reject(fields::NAME, format!("duplicates activity {}", existing)),
            None => RowPlan::Create(new),
        };
    };
    if !may_update {
        return reject(fields::ACTIVITY_ID, "may not update existing activities".into());
    }
    let Some(existing) = index.by_id.get(id) else {
        return reject(
            fields::ACTIVITY_ID,
            format!("unknown activity '{}' for planning year {}", id, ctx.planning_year),
        );
    };
    if let Some(other) = index.duplicate_of(&new).filter(|other| *other != id.as_str()) {
        return reject(fields::NAME, format!("duplicates activity {}", other));
    }

    let draft = &row.draft;
    let mut next = existing.clone();
    next.name = new.name;
    next.cluster_id = new.cluster_id;
    next.funder_id = new.funder_id;
    next.planned_month = new.planned_month;
    next.quarter = quarter_of(new.planned_month);
    next.planned_budget = new.planned_budget;
    if !draft.status.is_blank() {
        next.status_id = new.status_id;
    }
    if !draft.currency.is_blank() {
        next.currency_id = new.currency_id;
    }
    if !draft.disbursed_amount.is_blank() {
        next.disbursed_amount = new.disbursed_amount;
    }
    if !draft.responsible_officer.is_blank() {
        next.responsible_officer = new.responsible_officer;
    }
    if !draft.notes.is_blank() {
        next.notes = new.notes;
    }
    if next.disbursed_amount.unwrap_or_default() > next.planned_budget {
        return reject(fields::DISBURSED_AMOUNT, rules::EXCEEDS_BUDGET.into());
    }
    RowPlan::Update(next)
}

impl TrackerService {
    /// Validates every row of the sheet against one snapshot of master data,
    /// commits each clean row on its own and records every rejected row.
    /// The batch is completed even when a row could not be recorded, and the
    /// summary is read back from what was stored.
    #[instrument(skip(self, caller, bytes), fields(user = %caller.username, size = bytes.len()))]
    pub async fn bulk_upload(
        &self,
        caller: &Principal,
        planning_year: i32,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<UploadSummary> {
        caller.authorize(Resource::UploadBatch, Operation::Upload)?;
        validate_planning_year(planning_year)?;
        let size = bytes.len() as u64;
        if size > self.settings.max_upload_bytes {
            return Err(Error::FileTooLarge { size, limit: self.settings.max_upload_bytes });
        }

        let rows = parse_sheet(file_name, bytes)?;
        let ctx = self.validation_context(planning_year).await?;
        let engine = get_upload_validator();
        let may_update = caller.authorize(Resource::Activity, Operation::Update).is_ok();
        let year = ActivityFilter { year: Some(planning_year), ..Default::default() };
        let mut index = YearIndex::new(
            ActivityRepository::new(self.pool.clone())
                .list(&year, &caller.visibility())
                .await?,
        );

        let batches = UploadBatchRepository::new(self.pool.clone());
        let batch = batches.create(planning_year, file_name, &caller.username).await?;
        info!(batch = %batch.id, rows = rows.len(), "upload batch opened");

        let mut fatal = None;
        for row in &rows {
            let plan = plan_row(row, &engine, &ctx, &index, may_update);
            if let Err(e) = store_row(&batches, batch.id, row.row_number, plan, &mut index, &caller.username).await {
                error!(batch = %batch.id, row = row.row_number, error = %e, "upload stopped");
                fatal = Some(e);
                break;
            }
        }

        let finalized = batches.finalize(batch.id, &caller.username).await;
        if let Some(e) = fatal {
            return Err(e);
        }
        let report = finalized?;
        Ok(UploadSummary::from_rows(batch.id, planning_year, &report.rows))
    }

    /// A stored batch with every field error of every row.
    pub async fn batch_report(&self, caller: &Principal, batch_id: Uuid) -> Result<BatchReport> {
        caller.authorize(Resource::UploadBatch, Operation::View)?;
        UploadBatchRepository::new(self.pool.clone())
            .get_report(batch_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("upload batch {}", batch_id)))
    }
}

/// Commits one planned row. A row whose activity cannot be stored is
/// recorded as rejected; only a failure to record the row itself is an error.
async fn store_row(
    batches: &UploadBatchRepository,
    batch_id: Uuid,
    row_number: u32,
    plan: RowPlan,
    index: &mut YearIndex,
    actor: &str,
) -> Result<()> {
    let stored = match plan {
        RowPlan::Create(new) => batches.commit_accepted(batch_id, row_number, &new, actor).await,
        RowPlan::Update(next) => batches.commit_updated(batch_id, row_number, &next, actor).await,
        RowPlan::Reject(errors) => {
            warn!(row = row_number, errors = errors.len(), "row rejected");
            batches.record_rejected(batch_id, row_number, &errors).await?;
            return Ok(());
        }
    };
    match stored {
        Ok(activity) => {
            debug!(row = row_number, id = %activity.id, "row stored");
            index.record(&activity);
        }
        Err(e) => {
            error!(row = row_number, error = %e, "row could not be stored");
            let errors = [FieldError::new("row", "could not be stored")];
            batches.record_rejected(batch_id, row_number, &errors).await?;
        }
    }
    Ok(())
}
