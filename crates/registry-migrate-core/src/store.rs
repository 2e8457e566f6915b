// crates/registry-migrate-core/src/store.rs
// ============================================================================
// Module: Registry Store Access
// Description: Opens the legacy registry SQLite database for migration.
// Purpose: Apply safe pragmas and refuse to create stores that do not exist.
// Dependencies: rusqlite, serde
// ============================================================================

//! ## Overview
//! The migration only ever runs against an existing, populated store, so the
//! connection is opened without `SQLITE_OPEN_CREATE`. Path limits mirror the
//! rest of the tooling and fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use serde::Deserialize;
use serde::Serialize;

use crate::error::MigrationError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Upper bound for the busy timeout (ms).
pub const MAX_BUSY_TIMEOUT_MS: u64 = 600_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
/// - The journal mode persists in the database file, so it is only switched
///   after a committed migration and only when configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// WAL journal mode.
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl JournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Connection settings for the registry store.
///
/// # Invariants
/// - `path` must name an existing database file.
/// - `busy_timeout_ms` is in `1..=MAX_BUSY_TIMEOUT_MS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// Journal mode to switch to after a committed run; `None` keeps the store's.
    pub journal_mode: Option<JournalMode>,
    /// `SQLite` sync mode.
    pub sync_mode: SyncMode,
}

impl StoreConfig {
    /// Builds a config for `path` with default pragmas.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: None,
            sync_mode: SyncMode::default(),
        }
    }

    /// Opens the configured store.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Invalid`] for unsafe or missing paths and
    /// [`MigrationError::Db`] when the engine refuses the connection.
    pub fn open(&self) -> Result<Connection, MigrationError> {
        validate_store_path(&self.path)?;
        if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(MigrationError::Invalid(format!(
                "busy_timeout_ms out of range: {} (max {MAX_BUSY_TIMEOUT_MS})",
                self.busy_timeout_ms
            )));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let connection = Connection::open_with_flags(&self.path, flags)?;
        apply_pragmas(&connection, self)?;
        Ok(connection)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates store paths for safety limits and existence.
fn validate_store_path(path: &Path) -> Result<(), MigrationError> {
    if path.as_os_str().is_empty() {
        return Err(MigrationError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(MigrationError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(MigrationError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(MigrationError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    if !path.exists() {
        return Err(MigrationError::Invalid(format!(
            "store does not exist: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Applies the connection-scoped pragmas for a durable, FK-checked migration.
///
/// Nothing here persists in the database file.
fn apply_pragmas(connection: &Connection, config: &StoreConfig) -> Result<(), MigrationError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}
