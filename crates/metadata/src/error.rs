//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    /// Whether this error is a unique-constraint rejection, used by the
    /// lifecycle coordinator to classify double-claim races.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Constraint(_) => true,
            Self::Database(sqlx::Error::Database(db_err)) => {
                db_err.message().contains("UNIQUE constraint")
            }
            _ => false,
        }
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
