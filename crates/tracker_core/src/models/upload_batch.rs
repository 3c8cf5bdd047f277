use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use time::OffsetDateTime;
use uuid::Uuid;

/// A single field failure on one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }
}

/// A field failure located at a spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: u32,
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RowOutcome {
    /// A new activity was created.
    Accepted,
    /// The row named an existing activity and replaced its values.
    Updated,
    Rejected,
}

/// The persisted outcome of one data row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRow {
    pub row_number: u32,
    pub outcome: RowOutcome,
    pub activity_id: Option<String>,
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBatch {
    pub id: Uuid,
    pub planning_year: i32,
    pub file_name: String,
    pub uploaded_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    pub accepted_count: i64,
    pub updated_count: i64,
    pub rejected_count: i64,
}

impl UploadBatch {
    /// Recounts outcomes from the stored rows.
    pub fn tally(&mut self, rows: &[BatchRow]) {
        let count = |outcome| rows.iter().filter(|r| r.outcome == outcome).count() as i64;
        self.accepted_count = count(RowOutcome::Accepted);
        self.updated_count = count(RowOutcome::Updated);
        self.rejected_count = count(RowOutcome::Rejected);
    }
}

/// What an upload request returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub batch_id: Uuid,
    pub planning_year: i32,
    pub accepted_count: i64,
    pub updated_count: i64,
    pub rejected_count: i64,
    /// One entry per rejected row: its first failing field.
    pub errors: Vec<RowError>,
    /// Activities created by the upload.
    pub activity_ids: Vec<String>,
    /// Existing activities the upload changed.
    pub updated_ids: Vec<String>,
}

impl UploadSummary {
    /// Derives the summary from persisted outcome rows, so the counts always
    /// agree with what was stored.
    pub fn from_rows(batch_id: Uuid, planning_year: i32, rows: &[BatchRow]) -> Self {
        let mut summary = Self {
            batch_id,
            planning_year,
            accepted_count: 0,
            updated_count: 0,
            rejected_count: 0,
            errors: Vec::new(),
            activity_ids: Vec::new(),
            updated_ids: Vec::new(),
        };
        let mut ordered: Vec<&BatchRow> = rows.iter().collect();
        ordered.sort_by_key(|r| r.row_number);
        for row in ordered {
            match row.outcome {
                RowOutcome::Accepted => {
                    summary.accepted_count += 1;
                    if let Some(id) = &row.activity_id {
                        summary.activity_ids.push(id.clone());
                    }
                }
                RowOutcome::Updated => {
                    summary.updated_count += 1;
                    if let Some(id) = &row.activity_id {
                        summary.updated_ids.push(id.clone());
                    }
                }
                RowOutcome::Rejected => {
                    summary.rejected_count += 1;
                    let first = row.errors.first();
                    summary.errors.push(RowError {
                        row: row.row_number,
                        field: first.map(|e| e.field.clone()).unwrap_or_else(|| "row".to_string()),
                        reason: first.map(|e| e.reason.clone()).unwrap_or_else(|| "rejected".to_string()),
                    });
                }
            }
        }
        summary
    }
}

/// A stored batch with every row outcome, as returned by the batch lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    #[serde(flatten)]
    pub batch: UploadBatch,
    pub rows: Vec<BatchRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_errors_come_from_rows() {
        let rows = vec![
            BatchRow {
                row_number: 3,
                outcome: RowOutcome::Accepted,
                activity_id: Some("Y26-000001".into()),
                errors: vec![],
            },
            BatchRow {
                row_number: 2,
                outcome: RowOutcome::Rejected,
                activity_id: None,
                errors: vec![
                    FieldError::new("cluster", "unknown cluster 'XYZ'"),
                    FieldError::new("planned_budget", "must be non-negative"),
                ],
            },
        ];
        let summary = UploadSummary::from_rows(Uuid::nil(), 2026, &rows);
        assert_eq!(summary.accepted_count, 1);
        assert_eq!(summary.rejected_count, 1);
        assert_eq!(
            summary.errors,
            vec![RowError { row: 2, field: "cluster".into(), reason: "unknown cluster 'XYZ'".into() }]
        );
        assert_eq!(summary.activity_ids, vec!["Y26-000001".to_string()]);
    }

    #[test]
    fn updated_rows_are_counted_apart_from_created_ones() {
        let rows = vec![
            BatchRow {
                row_number: 2,
                outcome: RowOutcome::Updated,
                activity_id: Some("Y26-000004".into()),
                errors: vec![],
            },
            BatchRow {
                row_number: 3,
                outcome: RowOutcome::Accepted,
                activity_id: Some("Y26-000005".into()),
                errors: vec![],
            },
        ];
        let summary = UploadSummary::from_rows(Uuid::nil(), 2026, &rows);
        assert_eq!((summary.accepted_count, summary.updated_count), (1, 1));
        assert_eq!(summary.updated_ids, vec!["Y26-000004".to_string()]);
        assert_eq!(summary.activity_ids, vec!["Y26-000005".to_string()]);

        let mut batch = UploadBatch {
            id: Uuid::nil(),
            planning_year: 2026,
            file_name: "plan.csv".into(),
            uploaded_by: "admin".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            completed_at: None,
            accepted_count: 0,
            updated_count: 0,
            rejected_count: 0,
        };
        batch.tally(&rows);
        assert_eq!((batch.accepted_count, batch.updated_count, batch.rejected_count), (1, 1, 0));
        assert_eq!(RowOutcome::Updated.as_ref(), "updated");
    }

    #[test]
    fn empty_batch_is_all_zero() {
        let summary = UploadSummary::from_rows(Uuid::nil(), 2026, &[]);
        assert_eq!((summary.accepted_count, summary.rejected_count), (0, 0));
        assert!(summary.errors.is_empty());
    }
}
