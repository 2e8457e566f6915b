// crates/registry-migrate-core/src/error.rs
// ============================================================================
// Module: Migration Errors
// Description: Error taxonomy for the registry v2 migration.
// Purpose: Classify failures so callers know whether a re-run is safe.
// Dependencies: rusqlite, thiserror
// ============================================================================

//! ## Overview
//! Every failure aborts the migration transaction; the variants only tell the
//! invoker *why*. Precondition violations surface as
//! [`MigrationError::SchemaMismatch`] before any write happens, referential
//! breaches as [`MigrationError::Inconsistent`], and engine contention as
//! [`MigrationError::Transaction`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::ErrorCode;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry migration errors.
///
/// # Invariants
/// - Error messages never embed SDL payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MigrationError {
    /// Store I/O error.
    #[error("migration io error: {0}")]
    Io(String),
    /// Invalid store configuration or path.
    #[error("migration invalid input: {0}")]
    Invalid(String),
    /// Store is not in the expected pre-migration shape.
    #[error("migration schema mismatch: {0}")]
    SchemaMismatch(String),
    /// Legacy data violates referential integrity.
    #[error("migration data inconsistency: {0}")]
    Inconsistent(String),
    /// Store-level contention or constraint failure; the whole run may be retried.
    #[error("migration transaction failure: {0}")]
    Transaction(String),
    /// The run was cancelled and rolled back.
    #[error("migration cancelled")]
    Cancelled,
    /// Any other `SQLite` engine error.
    #[error("migration db error: {0}")]
    Db(String),
}

impl MigrationError {
    /// Returns a stable label used in audit events.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Invalid(_) => "invalid",
            Self::SchemaMismatch(_) => "schema_mismatch",
            Self::Inconsistent(_) => "inconsistent",
            Self::Transaction(_) => "transaction",
            Self::Cancelled => "cancelled",
            Self::Db(_) => "db",
        }
    }

    /// Returns true when re-running the unchanged migration may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transaction(_) | Self::Cancelled)
    }
}

impl From<rusqlite::Error> for MigrationError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::OperationInterrupted) => Self::Cancelled,
            Some(
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::ConstraintViolation,
            ) => Self::Transaction(err.to_string()),
            _ => Self::Db(err.to_string()),
        }
    }
}

/// Returns true when the engine rejected a statement for naming a missing column.
#[must_use]
pub fn is_missing_column(err: &rusqlite::Error) -> bool {
    err.to_string().to_ascii_lowercase().contains("no such column")
}

// ============================================================================
// SECTION: Tests
// ============================================================================
