use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown or inactive reference: {0}")]
    ReferentialIntegrity(String),

    #[error("File rejected: {0}")]
    FileConstraint(String),

    #[error("File rejected: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Entity not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
