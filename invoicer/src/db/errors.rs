//! Database errors, classified by the constraint that rejected a write.

use sqlx::error::{DatabaseError, ErrorKind};
use thiserror::Error;

/// Constraint names from the migrations that callers react to
pub mod constraints {
    pub const USERNAME_UNIQUE: &str = "users_username_unique";
    pub const EMAIL_UNIQUE: &str = "users_email_unique";
    pub const INVOICE_NUMBER_UNIQUE: &str = "invoices_invoice_number_unique";
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Entity not found")]
    NotFound,

    #[error("Unique constraint violation")]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    #[error("Foreign key constraint violation")]
    ForeignKeyViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Quantity, unit price and date ordering are also checked in the schema
    #[error("Check constraint violation")]
    CheckViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Anything the application can't act on
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DbError {
    /// Name of the constraint that rejected the write, if any
    pub fn constraint(&self) -> Option<&str> {
        match self {
            DbError::UniqueViolation { constraint, .. }
            | DbError::ForeignKeyViolation { constraint, .. }
            | DbError::CheckViolation { constraint, .. } => constraint.as_deref(),
            DbError::NotFound | DbError::Other(_) => None,
        }
    }

    pub fn is_unique_violation_of(&self, name: &str) -> bool {
        matches!(self, DbError::UniqueViolation { .. }) && self.constraint() == Some(name)
    }
}

struct Violation {
    constraint: Option<String>,
    table: Option<String>,
    message: String,
}

impl Violation {
    fn of(db_err: &dyn DatabaseError) -> Self {
        Self {
            constraint: db_err.constraint().map(str::to_string),
            table: db_err.table().map(str::to_string),
            message: db_err.message().to_string(),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let (kind, Violation { constraint, table, message }) = match &err {
            sqlx::Error::RowNotFound => return DbError::NotFound,
            sqlx::Error::Database(db_err) => (db_err.kind(), Violation::of(&**db_err)),
            _ => return DbError::Other(anyhow::Error::from(err)),
        };

        match kind {
            ErrorKind::UniqueViolation => DbError::UniqueViolation { constraint, table, message },
            ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { constraint, table, message },
            ErrorKind::CheckViolation => DbError::CheckViolation { constraint, table, message },
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
