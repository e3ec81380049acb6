use diesel::result::{DatabaseErrorKind, Error as DieselError};
use orderlens_core::errors::{DatabaseError, Error};

/// Failures raised inside the SQLite layer. Converted into the core error at
/// the repository boundary.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Query failed: {0}")]
    Query(#[from] DieselError),

    #[error("Connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Write actor unavailable: {0}")]
    Writer(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    /// An engine error raised inside a write transaction.
    #[error(transparent)]
    Core(#[from] Error),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Query(DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                info,
            )) => Error::Database(DatabaseError::UniqueViolation(info.message().to_string())),
            StorageError::Query(DieselError::NotFound) => {
                Error::Database(DatabaseError::NotFound("record not found".to_string()))
            }
            StorageError::Query(e) => Error::Database(DatabaseError::QueryFailed(e.to_string())),
            StorageError::Connection(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::Pool(e) => Error::Database(DatabaseError::ConnectionFailed(e.to_string())),
            StorageError::Migration(message) => {
                Error::Database(DatabaseError::MigrationFailed(message))
            }
            StorageError::Writer(message) => Error::Database(DatabaseError::Internal(message)),
            StorageError::InvalidValue(message) => {
                Error::Database(DatabaseError::Internal(message))
            }
            StorageError::Core(e) => e,
        }
    }
}
