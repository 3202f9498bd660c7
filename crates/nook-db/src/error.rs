use thiserror::Error;

/// Errors surfaced by the store.
///
/// Conflict and not-found cases get their own variants so callers can map
/// them to precise HTTP statuses instead of pattern-matching on SQLite
/// error strings.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("room already exists: {0}")]
    RoomAlreadyExists(String),

    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("user already exists: {0}")]
    UserAlreadyExists(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("database must be file-backed, got {0:?}")]
    NotFileBacked(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,
}

/// True when the error is a UNIQUE/PRIMARY KEY constraint failure.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
