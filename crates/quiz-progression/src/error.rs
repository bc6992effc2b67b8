//! Progression error types.

use quiz_database::DatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProgressionError {
    /// Local store failure; the write was rolled back.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Caller passed counts that would break the stats invariants.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type ProgressionResult<T> = Result<T, ProgressionError>;
