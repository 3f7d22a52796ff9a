//! Error types for ledger and workflow operations.
//!
//! Errors are classified by what the caller should do with them:
//! - NotFound: fatal to the single operation; bulk operations skip instead
//! - Validation: rejected before any mutation reached the store
//! - Db: the store itself failed
//! - Inconsistency: linked records disagree (crash-window damage; run cleanup)

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("consistency error: {0}")]
    Inconsistency(String),
}

impl ServiceError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// True when a bulk operation should skip this error and keep going.
    pub fn is_skippable_in_bulk(&self) -> bool {
        matches!(
            self,
            ServiceError::NotFound { .. } | ServiceError::Validation(_)
        )
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        ServiceError::Db(DbError::Sqlite(err))
    }
}
