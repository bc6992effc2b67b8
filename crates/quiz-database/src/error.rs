use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The dedicated database thread is gone or refused the call.
    #[error("database thread unavailable: {0}")]
    Executor(String),

    /// The database file or its directory could not be created.
    #[error("database file: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} not found")]
    NotFound(String),

    /// Question bank or stored option lists are not valid JSON.
    #[error("malformed question data: {0}")]
    QuestionData(#[from] serde_json::Error),

    /// A write would break a stats or session invariant.
    #[error("rejected stats write: {0}")]
    Invariant(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
