//! Error types for database-backed operations

use miette::Diagnostic;
use thiserror::Error;

/// Errors returned by [`crate::core::db::Database`] operations
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("{entity} #{id} not found")]
    #[diagnostic(code(nr13::not_found), help("Use the matching `list` command to see existing ids"))]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0}")]
    #[diagnostic(code(nr13::conflict))]
    Conflict(String),

    #[error("invalid data: {0}")]
    #[diagnostic(code(nr13::validation))]
    Validation(String),

    #[error("permission denied: {0}")]
    #[diagnostic(code(nr13::permission))]
    Permission(String),

    #[error("authentication failed: {0}")]
    #[diagnostic(code(nr13::auth), help("Check the e-mail and password, or ask an administrator to reactivate the account"))]
    Authentication(String),

    #[error("database schema version {found} is newer than this program supports ({supported})")]
    #[diagnostic(code(nr13::schema), help("Upgrade nr13 to open this database"))]
    SchemaTooNew { found: i32, supported: i32 },

    #[error("database error: {0}")]
    #[diagnostic(code(nr13::sqlite))]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(nr13::io))]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    #[diagnostic(code(nr13::csv))]
    Csv(#[from] csv::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        StoreError::Conflict(msg.into())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
