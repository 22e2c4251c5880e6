//! Storage Error Types

use thiserror::Error;

/// SQLSTATE codes we classify
mod sqlstate {
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const CHECK_VIOLATION: &str = "23514";
}

/// Failures reported by a storage adapter
#[derive(Error, Debug)]
pub enum StorageError {
    /// Concurrent transaction conflict; the whole operation may be retried
    #[error("transaction conflict: {0}")]
    Conflict(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("row not found: {0}")]
    MissingRow(String),

    /// A value cannot be represented in the storage column type
    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether re-running the whole operation from scratch may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Conflict(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        let code = e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|c| c.into_owned());

        match code.as_deref() {
            Some(sqlstate::SERIALIZATION_FAILURE) | Some(sqlstate::DEADLOCK_DETECTED) => {
                StorageError::Conflict(e.to_string())
            }
            Some(sqlstate::UNIQUE_VIOLATION)
            | Some(sqlstate::FOREIGN_KEY_VIOLATION)
            | Some(sqlstate::CHECK_VIOLATION) => StorageError::Constraint(e.to_string()),
            _ => match e {
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                    StorageError::Unavailable(e.to_string())
                }
                other => StorageError::Database(other),
            },
        }
    }
}
