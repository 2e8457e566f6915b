// crates/registry-migrate-core/src/shape.rs
// ============================================================================
// Module: Schema Shape
// Description: Detects legacy vs v2 table shapes and verifies migrated stores.
// Purpose: Fail fast before any write and check the contract after commit.
// Dependencies: rusqlite, serde
// ============================================================================

//! ## Overview
//! The store's shape is read from `pragma_table_info`. A store is `Legacy`
//! only when every legacy column is present and no v2 column exists, and
//! `Migrated` only in the exact reverse situation. Anything in between is
//! `Unrecognized` and is never touched.
//!
//! [`verify_migrated`] checks a committed store: statements naming the
//! obsolete columns must be rejected by the engine with "no such column",
//! and the populated v2 columns must be consistent with the project kinds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use rusqlite::Connection;
use rusqlite::Row;
use rusqlite::params;
use serde::Serialize;

use crate::error::MigrationError;
use crate::error::is_missing_column;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Columns both shapes must carry, per table.
const SHARED_COLUMNS: [(&str, &[&str]); 5] = [
    ("projects", &["id", "name", "type"]),
    ("targets", &["id", "project_id"]),
    ("commits", &["id", "target_id", "project_id", "created_at"]),
    ("versions", &["id", "target_id", "commit_id"]),
    ("version_commit", &["version_id", "commit_id"]),
];

/// Columns only the legacy shape carries.
const LEGACY_COLUMNS: [(&str, &str); 4] = [
    ("commits", "service"),
    ("commits", "content"),
    ("versions", "valid"),
    ("version_commit", "url"),
];

/// Columns only the v2 shape carries.
const MIGRATED_COLUMNS: [(&str, &str); 5] = [
    ("commits", "service_name"),
    ("commits", "sdl"),
    ("commits", "action"),
    ("commits", "service_url"),
    ("versions", "is_composable"),
];

/// Counts commits whose action disagrees with their project's kind.
const MISCLASSIFIED_SQL: &str = "SELECT COUNT(*)
FROM commits c
JOIN targets t ON t.id = c.target_id
JOIN projects p ON p.id = t.project_id
WHERE c.action IS NOT NULL
  AND ((p.type IN ('FEDERATION', 'STITCHING') AND c.action = 'N/A')
    OR (p.type NOT IN ('FEDERATION', 'STITCHING') AND c.action <> 'N/A'))";

/// Counts join rows that are not a version's self-pairing.
const NON_SELF_PAIRINGS_SQL: &str = "SELECT COUNT(*)
FROM version_commit vc
WHERE NOT EXISTS (
    SELECT 1 FROM versions v
    WHERE v.id = vc.version_id AND v.commit_id = vc.commit_id
)";

// ============================================================================
// SECTION: Shape
// ============================================================================

/// Observed shape of a registry store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaShape {
    /// Pre-migration shape; the migration may run.
    Legacy,
    /// v2 shape; the migration has already committed.
    Migrated,
    /// Neither shape; carries the first discrepancy found.
    Unrecognized(String),
}

impl SchemaShape {
    /// Inspects the store's table columns.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Db`] when the catalog cannot be read.
    pub fn inspect(connection: &Connection) -> Result<Self, MigrationError> {
        for (table, columns) in SHARED_COLUMNS {
            let present = table_columns(connection, table)?;
            if present.is_empty() {
                return Ok(Self::Unrecognized(format!("missing table {table}")));
            }
            if let Some(column) = columns.iter().find(|column| !present.contains(**column)) {
                return Ok(Self::Unrecognized(format!("missing column {table}.{column}")));
            }
        }
        let legacy = count_present(connection, &LEGACY_COLUMNS)?;
        let migrated = count_present(connection, &MIGRATED_COLUMNS)?;
        Ok(match (legacy, migrated) {
            (legacy, 0) if legacy == LEGACY_COLUMNS.len() => Self::Legacy,
            (0, migrated) if migrated == MIGRATED_COLUMNS.len() => Self::Migrated,
            (legacy, migrated) => Self::Unrecognized(format!(
                "partial shape: {legacy}/{} legacy columns, {migrated}/{} v2 columns",
                LEGACY_COLUMNS.len(),
                MIGRATED_COLUMNS.len()
            )),
        })
    }

    /// Returns a stable label for reports.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Migrated => "migrated",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Fails unless the store is in the legacy shape.
///
/// # Errors
///
/// Returns [`MigrationError::SchemaMismatch`] for migrated or unrecognized stores.
pub fn require_legacy(connection: &Connection) -> Result<(), MigrationError> {
    match SchemaShape::inspect(connection)? {
        SchemaShape::Legacy => Ok(()),
        SchemaShape::Migrated => {
            Err(MigrationError::SchemaMismatch("store already migrated".to_string()))
        }
        SchemaShape::Unrecognized(reason) => Err(MigrationError::SchemaMismatch(format!(
            "store is not in the legacy shape: {reason}"
        ))),
    }
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Outcome of checking a migrated store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Obsolete columns the engine rejected as `table.column`.
    pub rejected_columns: Vec<String>,
    /// Total commits.
    pub commits: u64,
    /// Commits with a null action.
    pub commits_without_action: u64,
    /// Commits whose action contradicts their project kind.
    pub misclassified_commits: u64,
    /// Join rows that are not a version's self-pairing.
    pub non_self_pairings: u64,
}

impl VerificationReport {
    /// Returns true when the store satisfies the v2 contract.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.rejected_columns.len() == LEGACY_COLUMNS.len()
            && self.commits_without_action == 0
            && self.misclassified_commits == 0
            && self.non_self_pairings == 0
    }
}

/// Checks a store against the post-migration contract.
///
/// # Errors
///
/// Returns [`MigrationError::SchemaMismatch`] when the store is not in the v2
/// shape and [`MigrationError::Inconsistent`] when an obsolete column is still
/// readable.
pub fn verify_migrated(connection: &Connection) -> Result<VerificationReport, MigrationError> {
    match SchemaShape::inspect(connection)? {
        SchemaShape::Migrated => {}
        SchemaShape::Legacy => {
            return Err(MigrationError::SchemaMismatch("store is not migrated".to_string()));
        }
        SchemaShape::Unrecognized(reason) => {
            return Err(MigrationError::SchemaMismatch(format!(
                "store is not in the v2 shape: {reason}"
            )));
        }
    }
    let mut rejected_columns = Vec::with_capacity(LEGACY_COLUMNS.len());
    for (table, column) in LEGACY_COLUMNS {
        match connection.prepare(&format!("SELECT {column} FROM {table} LIMIT 0")) {
            Err(err) if is_missing_column(&err) => rejected_columns.push(format!("{table}.{column}")),
            Err(err) => return Err(err.into()),
            Ok(_) => {
                return Err(MigrationError::Inconsistent(format!(
                    "obsolete column still readable: {table}.{column}"
                )));
            }
        }
    }
    Ok(VerificationReport {
        rejected_columns,
        commits: scalar(connection, "SELECT COUNT(*) FROM commits")?,
        commits_without_action: scalar(
            connection,
            "SELECT COUNT(*) FROM commits WHERE action IS NULL",
        )?,
        misclassified_commits: scalar(connection, MISCLASSIFIED_SQL)?,
        non_self_pairings: scalar(connection, NON_SELF_PAIRINGS_SQL)?,
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the column names of `table`, empty when the table does not exist.
fn table_columns(connection: &Connection, table: &str) -> Result<BTreeSet<String>, MigrationError> {
    let mut stmt = connection.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let rows = stmt.query_map(params![table], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<Result<BTreeSet<_>, _>>()?)
}

/// Counts how many of `columns` exist in the store.
fn count_present(
    connection: &Connection,
    columns: &[(&str, &str)],
) -> Result<usize, MigrationError> {
    let mut present = 0;
    for (table, column) in columns {
        if table_columns(connection, table)?.contains(*column) {
            present += 1;
        }
    }
    Ok(present)
}

/// Runs a single-value count query.
pub(crate) fn scalar(connection: &Connection, sql: &str) -> Result<u64, MigrationError> {
    Ok(connection.query_row(sql, params![], |row| count_column(row, 0))?)
}

/// Reads a `COUNT(*)` column as an unsigned count.
pub(crate) fn count_column(row: &Row<'_>, index: usize) -> rusqlite::Result<u64> {
    Ok(u64::try_from(row.get::<_, i64>(index)?).unwrap_or_default())
}
