use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString)]
pub enum AuditAction {
    #[strum(serialize = "activity.created")]
    #[serde(rename = "activity.created")]
    ActivityCreated,
    #[strum(serialize = "activity.updated")]
    #[serde(rename = "activity.updated")]
    ActivityUpdated,
    #[strum(serialize = "activity.status_changed")]
    #[serde(rename = "activity.status_changed")]
    ActivityStatusChanged,
    #[strum(serialize = "activity.retired")]
    #[serde(rename = "activity.retired")]
    ActivityRetired,
    #[strum(serialize = "attachment.uploaded")]
    #[serde(rename = "attachment.uploaded")]
    AttachmentUploaded,
    #[strum(serialize = "attachment.deleted")]
    #[serde(rename = "attachment.deleted")]
    AttachmentDeleted,
    #[strum(serialize = "attachment.downloaded")]
    #[serde(rename = "attachment.downloaded")]
    AttachmentDownloaded,
    #[strum(serialize = "upload.completed")]
    #[serde(rename = "upload.completed")]
    UploadCompleted,
    #[strum(serialize = "master.created")]
    #[serde(rename = "master.created")]
    MasterCreated,
    #[strum(serialize = "master.deactivated")]
    #[serde(rename = "master.deactivated")]
    MasterDeactivated,
}

/// One append-only audit record. `record_ref` is the affected activity id,
/// attachment id, batch id or master entry id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub username: String,
    pub action: AuditAction,
    pub record_ref: String,
    pub detail: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub username: String,
    pub action: AuditAction,
    pub record_ref: String,
    pub detail: Option<String>,
}

impl NewAuditEntry {
    pub fn new(username: impl Into<String>, action: AuditAction, record_ref: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            action,
            record_ref: record_ref.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
