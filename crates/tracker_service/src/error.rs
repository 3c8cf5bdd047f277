use thiserror::Error;

/// Every failure a service operation can report.
#[derive(Error, Debug)]
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

    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Identifier allocation conflict: {0}")]
    AllocationConflict(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tracker_core::Error> for Error {
    fn from(err: tracker_core::Error) -> Self {
        use tracker_core::Error as Core;
        match err {
            Core::Validation(m) => Error::Validation(m),
            Core::ReferentialIntegrity(m) => Error::ReferentialIntegrity(m),
            Core::FileConstraint(m) => Error::FileConstraint(m),
            Core::FileTooLarge { size, limit } => Error::FileTooLarge { size, limit },
            Core::Permission(m) => Error::Permission(m),
            Core::NotFound(m) => Error::NotFound(m),
        }
    }
}

impl From<tracker_db::Error> for Error {
    fn from(err: tracker_db::Error) -> Self {
        use tracker_db::Error as Db;
        match err {
            Db::Database(m) => Error::Database(m),
            Db::AllocationConflict(m) => Error::AllocationConflict(m),
            Db::Conflict(m) => Error::Conflict(m),
            Db::NotFound(m) => Error::NotFound(m),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        tracker_db::Error::from(err).into()
    }
}

impl From<calamine::XlsxError> for Error {
    fn from(err: calamine::XlsxError) -> Self {
        Error::Spreadsheet(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Spreadsheet(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Error::Spreadsheet(err.to_string())
    }
}
