// crates/registry-migrate-core/src/renamer.rs
// ============================================================================
// Module: Flag Renamer
// Description: Structural column renames for the v2 shape.
// Purpose: Rename legacy columns without rewriting their values.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! The renames are pure `ALTER TABLE .. RENAME COLUMN` statements, so stored
//! values (including nulls) are carried over untouched. `valid` and
//! `is_composable` mean the same thing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use rusqlite::Connection;

use crate::error::MigrationError;
use crate::model::VersionId;
use crate::snapshot::LegacySnapshot;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One legacy-to-v2 column rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRename {
    /// Table owning the column.
    pub table: &'static str,
    /// Legacy column name.
    pub from: &'static str,
    /// v2 column name.
    pub to: &'static str,
}

impl ColumnRename {
    /// Renders the rename as a single DDL statement.
    fn statement(self) -> String {
        format!("ALTER TABLE {} RENAME COLUMN {} TO {};", self.table, self.from, self.to)
    }
}

/// Fixed set of renames applied by the migration.
pub const COLUMN_RENAMES: [ColumnRename; 3] = [
    ColumnRename {
        table: "commits",
        from: "service",
        to: "service_name",
    },
    ColumnRename {
        table: "commits",
        from: "content",
        to: "sdl",
    },
    ColumnRename {
        table: "versions",
        from: "valid",
        to: "is_composable",
    },
];

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Applies every rename in [`COLUMN_RENAMES`].
///
/// # Errors
///
/// Returns [`MigrationError`] when a column is missing or the rename fails.
pub(crate) fn apply_renames(connection: &Connection) -> Result<(), MigrationError> {
    for rename in COLUMN_RENAMES {
        connection.execute_batch(&rename.statement())?;
    }
    Ok(())
}

/// Returns the `is_composable` value each version will carry.
#[must_use]
pub fn renamed_composability(snapshot: &LegacySnapshot) -> BTreeMap<VersionId, bool> {
    snapshot.versions.iter().map(|version| (version.id.clone(), version.valid)).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
