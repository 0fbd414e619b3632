use rusqlite::ErrorCode;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A unique constraint rejected the write. `field` names the input the
    /// caller should blame.
    #[error("{field} already exists")]
    Conflict { field: &'static str },

    #[error("record not found")]
    NotFound,

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("DB lock poisoned: {0}")]
    Poisoned(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl DbError {
    pub fn corrupt(what: impl std::fmt::Display) -> Self {
        Self::Corrupt(what.to_string())
    }
}

/// True when `err` is a UNIQUE or PRIMARY KEY violation.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
        }
        _ => false,
    }
}

/// Turn a unique violation into [`DbError::Conflict`] for `field`.
pub(crate) fn conflict_on(field: &'static str) -> impl FnOnce(rusqlite::Error) -> DbError {
    move |err| {
        if is_unique_violation(&err) {
            DbError::Conflict { field }
        } else {
            DbError::Sqlite(err)
        }
    }
}
