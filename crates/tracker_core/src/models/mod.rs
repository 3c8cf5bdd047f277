pub mod activity;
pub mod attachment;
pub mod audit;
pub mod master_data;
pub mod saved_view;
pub mod upload_batch;
pub mod user;

pub use activity::{Activity, ActivityFilter, ActivityUpdate, ActivityView, NewActivity};
pub use attachment::{Attachment, AttachmentGroup, AttachmentPolicy, DocumentType, FileType, NewAttachment};
pub use audit::{AuditAction, AuditEntry, NewAuditEntry};
pub use master_data::{MasterEntry, MasterIndex, MasterKind, NewMasterEntry};
pub use saved_view::{ChartOptions, NewSavedView, SavedView};
pub use upload_batch::{BatchReport, BatchRow, FieldError, RowError, RowOutcome, UploadBatch, UploadSummary};
pub use user::{NewUser, User};
