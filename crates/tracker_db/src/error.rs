use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    /// Lock contention or a lost race on an allocated key. Retried by
    /// `retry::retry_on_conflict` and never shown to callers as a duplicate.
    #[error("Allocation conflict: {0}")]
    AllocationConflict(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

// SQLite primary result codes; extended codes keep them in the low byte.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

fn is_contention(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
        _ => false,
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if is_contention(&err) {
            return Error::AllocationConflict(err.to_string());
        }
        if is_unique_violation(&err) {
            return Error::Conflict(err.to_string());
        }
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("row".to_string()),
            other => Error::Database(other.to_string()),
        }
    }
}

/// For statements racing on an allocated key: a unique violation there means
/// another writer got the key first, so it is retried like lock contention.
pub(crate) fn allocation(err: sqlx::Error) -> Error {
    if is_unique_violation(&err) {
        Error::AllocationConflict(err.to_string())
    } else {
        Error::from(err)
    }
}
