use rusqlite::ffi;
use thiserror::Error;

/// Domain error taxonomy. Storage driver errors never escape as-is; they are
/// translated into one of these variants at the store boundary.
///
/// A lookup that finds nothing is `Ok(None)`, not an error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid: {0}")]
    Invalid(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("resource version does not match the stored version")]
    OptimisticLock,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Which integrity rule a failed statement tripped, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Constraint {
    Unique,
    ForeignKey,
    Check,
    NotNull,
    Other,
}

pub(crate) fn constraint_kind(err: &rusqlite::Error) -> Option<Constraint> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Some(match e.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    Constraint::Unique
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Constraint::ForeignKey,
                ffi::SQLITE_CONSTRAINT_CHECK => Constraint::Check,
                ffi::SQLITE_CONSTRAINT_NOTNULL => Constraint::NotNull,
                _ => Constraint::Other,
            })
        }
        _ => None,
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match constraint_kind(&err) {
            Some(Constraint::Unique) => Error::Conflict("resource already exists".to_string()),
            Some(Constraint::ForeignKey) => {
                Error::Conflict("referential integrity violation".to_string())
            }
            Some(_) => Error::Conflict(err.to_string()),
            None => {
                tracing::error!("Unexpected database error: {err}");
                Error::Internal(err.to_string())
            }
        }
    }
}
