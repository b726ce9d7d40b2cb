use thiserror::Error;

use super::ids::{GroupId, StudentId};

/// Uniform error type for group storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness rule was violated, typically a student claimed by a concurrent run.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Map sqlx errors, turning unique violations into `Conflict`.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(db_err.message().to_string());
            }
            // serialization_failure under SERIALIZABLE isolation
            if db_err.code().as_deref() == Some("40001") {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

/// Errors surfaced by the peer-group service.
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group size must be at least 2, got {0}")]
    InvalidGroupSize(usize),

    #[error("peer group {0} not found")]
    GroupNotFound(GroupId),

    #[error("student {0} is not in a peer group")]
    StudentNotGrouped(StudentId),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl GroupError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GroupError::GroupNotFound(_) | GroupError::StudentNotGrouped(_))
    }
}
