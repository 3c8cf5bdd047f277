use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{Error, Result};

pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, AsRefStr, EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DocumentType {
    Report,
    Proposal,
    Contract,
    Invoice,
    Receipt,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FileType {
    Pdf,
    Docx,
    Xlsx,
}

impl FileType {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        ext.parse().ok()
    }

    pub fn content_type(self) -> &'static str {
        match self {
            FileType::Pdf => "application/pdf",
            FileType::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            FileType::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    fn signature_matches(self, bytes: &[u8]) -> bool {
        match self {
            FileType::Pdf => bytes.starts_with(b"%PDF-"),
            // Office Open XML documents are ZIP containers.
            FileType::Docx | FileType::Xlsx => bytes.starts_with(b"PK\x03\x04"),
        }
    }
}

/// Size and type limits applied to an attachment before anything is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentPolicy {
    pub max_bytes: u64,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self { max_bytes: DEFAULT_MAX_ATTACHMENT_BYTES }
    }
}

impl AttachmentPolicy {
    pub fn check(&self, filename: &str, bytes: &[u8]) -> Result<FileType> {
        let file_type = FileType::from_filename(filename).ok_or_else(|| {
            Error::FileConstraint(format!(
                "'{}' is not an allowed file type (pdf, docx, xlsx)",
                filename
            ))
        })?;
        if bytes.is_empty() {
            return Err(Error::FileConstraint(format!("'{}' is empty", filename)));
        }
        let size = bytes.len() as u64;
        if size > self.max_bytes {
            return Err(Error::FileTooLarge { size, limit: self.max_bytes });
        }
        if !file_type.signature_matches(bytes) {
            return Err(Error::FileConstraint(format!(
                "'{}' does not look like a {} file",
                filename, file_type
            )));
        }
        Ok(file_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub activity_id: String,
    pub document_type: DocumentType,
    pub filename: String,
    pub file_type: FileType,
    pub description: Option<String>,
    pub version: i64,
    pub file_size: i64,
    pub checksum: String,
    #[serde(skip_serializing, default)]
    pub storage_key: String,
    pub uploaded_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
    pub is_latest: bool,
    pub is_deleted: bool,
}

/// Everything needed to record an upload; the version is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub id: Uuid,
    pub activity_id: String,
    pub document_type: DocumentType,
    pub filename: String,
    pub file_type: FileType,
    pub description: Option<String>,
    pub file_size: i64,
    pub checksum: String,
    pub storage_key: String,
    pub uploaded_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentGroup {
    pub document_type: DocumentType,
    pub versions: Vec<Attachment>,
}

/// Groups attachments by document type (in enum order), newest version first.
pub fn group_by_type(mut attachments: Vec<Attachment>) -> Vec<AttachmentGroup> {
    attachments.sort_by(|a, b| {
        a.document_type
            .cmp(&b.document_type)
            .then(b.version.cmp(&a.version))
    });
    let mut groups: Vec<AttachmentGroup> = Vec::new();
    for attachment in attachments {
        match groups.last_mut() {
            Some(group) if group.document_type == attachment.document_type => {
                group.versions.push(attachment)
            }
            _ => groups.push(AttachmentGroup {
                document_type: attachment.document_type,
                versions: vec![attachment],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &[u8] = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n";

    #[test]
    fn accepts_allow_listed_types_with_matching_signature() {
        let policy = AttachmentPolicy::default();
        assert_eq!(policy.check("report.PDF", PDF).unwrap(), FileType::Pdf);
        assert_eq!(policy.check("budget.xlsx", b"PK\x03\x04rest").unwrap(), FileType::Xlsx);
        assert_eq!(policy.check("memo.docx", b"PK\x03\x04rest").unwrap(), FileType::Docx);
    }

    #[test]
    fn rejects_other_extensions_and_mismatched_content() {
        let policy = AttachmentPolicy::default();
        assert!(matches!(policy.check("run.exe", PDF), Err(Error::FileConstraint(_))));
        assert!(matches!(policy.check("noext", PDF), Err(Error::FileConstraint(_))));
        assert!(matches!(policy.check("fake.pdf", b"PK\x03\x04"), Err(Error::FileConstraint(_))));
        assert!(matches!(policy.check("empty.pdf", b""), Err(Error::FileConstraint(_))));
    }

    #[test]
    fn rejects_oversize_files() {
        let policy = AttachmentPolicy { max_bytes: 8 };
        assert_eq!(
            policy.check("report.pdf", PDF),
            Err(Error::FileTooLarge { size: PDF.len() as u64, limit: 8 })
        );
    }

    #[test]
    fn document_types_parse_case_insensitively() {
        assert_eq!("Contract".parse::<DocumentType>().unwrap(), DocumentType::Contract);
        assert!("memo".parse::<DocumentType>().is_err());
    }

    #[test]
    fn groups_newest_first() {
        let make = |doc: DocumentType, version: i64| Attachment {
            id: Uuid::now_v7(),
            activity_id: "Y26-000001".into(),
            document_type: doc,
            filename: format!("{doc}-{version}.pdf"),
            file_type: FileType::Pdf,
            description: None,
            version,
            file_size: 10,
            checksum: String::new(),
            storage_key: String::new(),
            uploaded_by: "admin".into(),
            uploaded_at: OffsetDateTime::UNIX_EPOCH,
            is_latest: false,
            is_deleted: false,
        };
        let groups = group_by_type(vec![
            make(DocumentType::Contract, 1),
            make(DocumentType::Report, 1),
            make(DocumentType::Contract, 2),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].document_type, DocumentType::Report);
        let versions: Vec<i64> = groups[1].versions.iter().map(|a| a.version).collect();
        assert_eq!(versions, vec![2, 1]);
    }
}
