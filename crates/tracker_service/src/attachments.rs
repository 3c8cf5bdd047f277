use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use tracker_core::access::{Operation, Principal, Resource};
use tracker_core::models::attachment::{group_by_type, Attachment, AttachmentGroup, DocumentType, NewAttachment};
use tracker_core::models::audit::{AuditAction, NewAuditEntry};
use tracker_db::repository::{AttachmentRepository, AuditRepository};

use crate::error::{Error, Result};
use crate::TrackerService;

#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub activity_id: String,
    pub document_type: DocumentType,
    pub filename: String,
    pub description: Option<String>,
    pub bytes: Vec<u8>,
}

/// Keeps the final path component of a browser-supplied name.
fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename).trim()
}

impl TrackerService {
    /// Stores a new version of a document. Type and size are checked before
    /// anything is written; the bytes are removed again if the database
    /// transaction fails.
    #[instrument(
        skip(self, caller, upload),
        fields(user = %caller.username, activity = %upload.activity_id, doc = %upload.document_type)
    )]
    pub async fn upload_attachment(&self, caller: &Principal, upload: AttachmentUpload) -> Result<Attachment> {
        caller.authorize(Resource::Attachment, Operation::Upload)?;
        let activity = self.visible_activity(caller, &upload.activity_id, false).await?;

        let filename = base_name(&upload.filename).to_string();
        let file_type = self.settings.attachment_policy.check(&filename, &upload.bytes)?;
        let checksum = hex::encode(Sha256::digest(&upload.bytes));
        let file_size = upload.bytes.len() as i64;

        let id = Uuid::now_v7();
        let storage_key = format!("{}/{}.{}", activity.activity.id, id, file_type);
        self.blobs
            .put(&storage_key, upload.bytes, file_type.content_type())
            .await?;

        let new = NewAttachment {
            id,
            activity_id: activity.activity.id.clone(),
            document_type: upload.document_type,
            filename,
            file_type,
            description: upload.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            file_size,
            checksum,
            storage_key: storage_key.clone(),
            uploaded_by: caller.username.clone(),
        };
        match AttachmentRepository::new(self.pool.clone()).insert_version(&new).await {
            Ok(attachment) => Ok(attachment),
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&storage_key).await {
                    warn!(key = %storage_key, error = %cleanup, "orphaned attachment blob");
                }
                Err(e.into())
            }
        }
    }

    /// Non-deleted attachments grouped by document type.
    pub async fn list_attachments(&self, caller: &Principal, activity_id: &str) -> Result<Vec<AttachmentGroup>> {
        caller.authorize(Resource::Attachment, Operation::View)?;
        self.visible_activity(caller, activity_id, false).await?;
        let attachments = AttachmentRepository::new(self.pool.clone())
            .list_active(activity_id)
            .await?;
        Ok(group_by_type(attachments))
    }

    /// Every version of one document type, deleted ones included.
    pub async fn attachment_history(
        &self,
        caller: &Principal,
        activity_id: &str,
        document_type: DocumentType,
    ) -> Result<Vec<Attachment>> {
        caller.authorize(Resource::Attachment, Operation::View)?;
        self.visible_activity(caller, activity_id, false).await?;
        Ok(AttachmentRepository::new(self.pool.clone())
            .history(activity_id, document_type)
            .await?)
    }

    #[instrument(skip(self, caller), fields(user = %caller.username))]
    pub async fn delete_attachment(&self, caller: &Principal, id: Uuid) -> Result<Attachment> {
        caller.authorize(Resource::Attachment, Operation::Delete)?;
        let repo = AttachmentRepository::new(self.pool.clone());
        let existing = repo
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("attachment {}", id)))?;
        self.visible_activity(caller, &existing.activity_id, false).await?;

        let deleted = repo.soft_delete(id, &caller.username).await?;
        info!(activity = %deleted.activity_id, version = deleted.version, "attachment deleted");
        Ok(deleted)
    }

    /// Returns the stored bytes and records the download.
    #[instrument(skip(self, caller), fields(user = %caller.username))]
    pub async fn download_attachment(&self, caller: &Principal, id: Uuid) -> Result<(Attachment, Vec<u8>)> {
        caller.authorize(Resource::Attachment, Operation::View)?;
        let attachment = AttachmentRepository::new(self.pool.clone())
            .get(id)
            .await?
            .filter(|a| !a.is_deleted)
            .ok_or_else(|| Error::NotFound(format!("attachment {}", id)))?;
        self.visible_activity(caller, &attachment.activity_id, false).await?;

        let bytes = self.blobs.get(&attachment.storage_key).await?;
        let entry = NewAuditEntry::new(&caller.username, AuditAction::AttachmentDownloaded, &attachment.activity_id)
            .with_detail(format!("Document \"{}\" (v{}) downloaded", attachment.filename, attachment.version));
        AuditRepository::new(self.pool.clone()).record(&entry).await?;
        Ok((attachment, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::base_name;

    #[test]
    fn base_name_drops_client_paths() {
        assert_eq!(base_name("C:\\Users\\me\\report.pdf"), "report.pdf");
        assert_eq!(base_name("/tmp/contract.docx"), "contract.docx");
        assert_eq!(base_name("budget.xlsx"), "budget.xlsx");
    }
}
