use thiserror::Error;

use crate::db::TypeMismatch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityKind {
    Unique,
    ForeignKey,
    Check,
    NotNull,
}

/// Coarse fault classes used by callers that care why an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    MetadataResolution,
    StatementExecution,
    Mapping,
    Validation,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("cannot resolve metadata for `{entity}`: {reason}")]
    Metadata { entity: &'static str, reason: String },
    #[error("integrity violation")]
    Integrity {
        kind: IntegrityKind,
        constraint: Option<String>,
        #[source]
        source: sqlx::Error,
    },
    #[error("temporary database failure")]
    Temporary(#[source] sqlx::Error),
    #[error("unhandled db error")]
    Fatal(#[source] sqlx::Error),
    #[error("statement failed: {0}")]
    Statement(String),
    #[error("cannot map value into field `{field}`: {reason}")]
    Mapping { field: String, reason: String },
    #[error("invalid operation: {0}")]
    Validation(String),
}

impl DbError {
    pub const fn code(&self) -> &'static str {
        match self {
            DbError::Metadata { .. } => "metadata_error",
            DbError::Integrity { .. } => "integrity_violation",
            DbError::Temporary(_) => "temporary_error",
            DbError::Fatal(_) => "fatal_error",
            DbError::Statement(_) => "statement_error",
            DbError::Mapping { .. } => "mapping_error",
            DbError::Validation(_) => "validation_error",
        }
    }

    pub const fn fault(&self) -> Fault {
        match self {
            DbError::Metadata { .. } => Fault::MetadataResolution,
            DbError::Integrity { .. }
            | DbError::Temporary(_)
            | DbError::Fatal(_)
            | DbError::Statement(_) => Fault::StatementExecution,
            DbError::Mapping { .. } => Fault::Mapping,
            DbError::Validation(_) => Fault::Validation,
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        DbError::Validation(reason.into())
    }

    pub fn mapping(field: &str, err: TypeMismatch) -> Self {
        DbError::Mapping {
            field: field.to_owned(),
            reason: err.to_string(),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) => {
                let kind = match db.kind() {
                    sqlx::error::ErrorKind::UniqueViolation => IntegrityKind::Unique,
                    sqlx::error::ErrorKind::ForeignKeyViolation => IntegrityKind::ForeignKey,
                    sqlx::error::ErrorKind::NotNullViolation => IntegrityKind::NotNull,
                    sqlx::error::ErrorKind::CheckViolation => IntegrityKind::Check,
                    _ => return DbError::Fatal(e),
                };
                DbError::Integrity {
                    kind,
                    constraint: db.constraint().map(|s| s.to_owned()),
                    source: e,
                }
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
                DbError::Temporary(e)
            }
            _ => DbError::Fatal(e),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
