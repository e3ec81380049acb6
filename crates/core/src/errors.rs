//! Error types shared by the order sync engine and its storage backends.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the order sync engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    /// The remote order feed could not deliver a page.
    #[error("Order source failed: {0}")]
    Source(String),
}

/// Storage-level failures, kept backend agnostic.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    #[error("Failed to run migrations: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an order source error
    pub fn source_failed(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }

    /// True when a write collided with a uniqueness constraint, e.g. two
    /// overlapping sync runs inserting the same order.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Database(DatabaseError::UniqueViolation(_)))
    }
}
