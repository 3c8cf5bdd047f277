pub mod error;
pub mod pool;
pub mod repository;
pub mod retry;
pub mod schema;

pub use error::{Error, Result};
pub use pool::{connect, connect_in_memory};
pub use repository::{
    ActivityRepository, AttachmentRepository, AuditRepository, MasterDataRepository, SavedViewRepository,
    UploadBatchRepository, UserRepository,
};
pub use schema::rebuild_database;
