// crates/registry-migrate-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Legacy registry fixtures for migration tests.
// Purpose: Build throwaway legacy stores and read back migrated rows.
// Dependencies: registry-migrate-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Creates legacy-shaped `SQLite` stores in temporary directories, seeds
//! projects, targets, commits, versions and join rows, and reads the v2
//! columns back after a run. Seeding connections keep foreign keys off so
//! tests can plant orphan rows on purpose.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    dead_code,
    reason = "Test-only helpers are shared across test binaries."
)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use registry_migrate_core::MigrationAuditEvent;
use registry_migrate_core::MigrationAuditSink;
use registry_migrate_core::Migrator;
use registry_migrate_core::StoreConfig;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;

// ============================================================================
// SECTION: Schema
// ============================================================================

/// One day in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

/// Legacy registry DDL.
pub const LEGACY_SCHEMA: &str = r#"
CREATE TABLE projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE targets (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT 0,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE
);
CREATE TABLE commits (
    id TEXT PRIMARY KEY,
    author TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    service TEXT,
    content TEXT,
    "commit" TEXT NOT NULL,
    target_id TEXT NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE
);
CREATE TABLE versions (
    id TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL DEFAULT 0,
    valid INTEGER NOT NULL,
    target_id TEXT NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
    commit_id TEXT NOT NULL REFERENCES commits(id) ON DELETE CASCADE
);
CREATE TABLE version_commit (
    version_id TEXT NOT NULL REFERENCES versions(id) ON DELETE CASCADE,
    commit_id TEXT NOT NULL REFERENCES commits(id) ON DELETE CASCADE,
    url TEXT,
    PRIMARY KEY (version_id, commit_id)
);
"#;

// ============================================================================
// SECTION: Store Fixture
// ============================================================================

/// Legacy store living in a temporary directory.
pub struct LegacyStore {
    /// Keeps the directory alive for the test's duration.
    _dir: TempDir,
    /// Database file path.
    pub path: PathBuf,
}

impl LegacyStore {
    /// Creates an empty legacy store.
    pub fn create() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.db");
        let connection = Connection::open(&path).unwrap();
        connection.execute_batch(LEGACY_SCHEMA).unwrap();
        Self {
            _dir: dir,
            path,
        }
    }

    /// Opens a seeding connection with foreign keys disabled.
    pub fn connect(&self) -> Connection {
        let connection = Connection::open(&self.path).unwrap();
        connection.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
        connection
    }

    /// Opens a migrator over the store with default pragmas.
    pub fn migrator(&self) -> Migrator {
        Migrator::open(&StoreConfig::for_path(&self.path)).unwrap()
    }
}

/// Creates an in-memory legacy store with foreign keys disabled.
pub fn memory_store() -> Connection {
    let connection = Connection::open_in_memory().unwrap();
    connection.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    connection.execute_batch(LEGACY_SCHEMA).unwrap();
    connection
}

// ============================================================================
// SECTION: Seeding
// ============================================================================

/// Inserts a project of the given legacy kind label.
pub fn insert_project(connection: &Connection, id: &str, kind: &str) {
    connection
        .execute(
            "INSERT INTO projects (id, name, type) VALUES (?1, ?2, ?3)",
            params![id, format!("{id}-name"), kind],
        )
        .unwrap();
}

/// Inserts a target under `project_id`.
pub fn insert_target(connection: &Connection, id: &str, project_id: &str) {
    connection
        .execute(
            "INSERT INTO targets (id, name, project_id) VALUES (?1, ?2, ?3)",
            params![id, format!("{id}-name"), project_id],
        )
        .unwrap();
}

/// Inserts a commit; its project is copied from the target when present.
pub fn insert_commit(
    connection: &Connection,
    id: &str,
    target_id: &str,
    service: Option<&str>,
    created_at: i64,
) {
    connection
        .execute(
            "INSERT INTO commits (id, author, created_at, service, content, \"commit\", \
             target_id, project_id)
             VALUES (?1, 'author', ?2, ?3, ?4, ?5, ?6,
                     COALESCE((SELECT project_id FROM targets WHERE id = ?6), 'missing'))",
            params![id, created_at, service, format!("{id}-sdl"), format!("{id}-label"), target_id],
        )
        .unwrap();
}

/// Inserts a version whose own commit is `commit_id`.
pub fn insert_version(connection: &Connection, id: &str, commit_id: &str, valid: bool) {
    connection
        .execute(
            "INSERT INTO versions (id, valid, target_id, commit_id)
             VALUES (?1, ?2, COALESCE((SELECT target_id FROM commits WHERE id = ?3), 'missing'), \
             ?3)",
            params![id, valid, commit_id],
        )
        .unwrap();
}

/// Inserts a join row.
pub fn insert_pairing(connection: &Connection, version_id: &str, commit_id: &str, url: Option<&str>) {
    connection
        .execute(
            "INSERT INTO version_commit (version_id, commit_id, url) VALUES (?1, ?2, ?3)",
            params![version_id, commit_id, url],
        )
        .unwrap();
}

/// Inserts a version of `commit_id` together with its self-pairing row.
pub fn insert_published_version(
    connection: &Connection,
    id: &str,
    commit_id: &str,
    valid: bool,
    url: Option<&str>,
) {
    insert_version(connection, id, commit_id, valid);
    insert_pairing(connection, id, commit_id, url);
}

// ============================================================================
// SECTION: Read-Back
// ============================================================================

/// Migrated commit columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedCommit {
    /// Commit identifier.
    pub id: String,
    /// `action` column.
    pub action: Option<String>,
    /// `service_name` column.
    pub service_name: Option<String>,
    /// `service_url` column.
    pub service_url: Option<String>,
    /// `sdl` column.
    pub sdl: Option<String>,
}

/// Reads the migrated commits of a target in creation order.
pub fn migrated_commits(connection: &Connection, target_id: &str) -> Vec<MigratedCommit> {
    let mut stmt = connection
        .prepare(
            "SELECT id, action, service_name, service_url, sdl FROM commits
             WHERE target_id = ?1 ORDER BY created_at, rowid",
        )
        .unwrap();
    stmt.query_map(params![target_id], |row| {
        Ok(MigratedCommit {
            id: row.get(0)?,
            action: row.get(1)?,
            service_name: row.get(2)?,
            service_url: row.get(3)?,
            sdl: row.get(4)?,
        })
    })
    .unwrap()
    .collect::<Result<Vec<_>, _>>()
    .unwrap()
}

/// Reads the `is_composable` flags of a target's versions in insertion order.
pub fn composability(connection: &Connection, target_id: &str) -> Vec<bool> {
    let mut stmt = connection
        .prepare("SELECT is_composable FROM versions WHERE target_id = ?1 ORDER BY rowid")
        .unwrap();
    stmt.query_map(params![target_id], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

/// Counts rows of a table.
pub fn row_count(connection: &Connection, table: &str) -> i64 {
    connection.query_row(&format!("SELECT COUNT(*) FROM {table}"), params![], |row| row.get(0)).unwrap()
}

/// Returns the column names of a table.
pub fn columns(connection: &Connection, table: &str) -> Vec<String> {
    let mut stmt = connection.prepare("SELECT name FROM pragma_table_info(?1)").unwrap();
    stmt.query_map(params![table], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

// ============================================================================
// SECTION: Audit Capture
// ============================================================================

/// Audit sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    /// Captured events.
    events: Mutex<Vec<MigrationAuditEvent>>,
}

impl RecordingAuditSink {
    /// Creates a shared recording sink.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the captured `(event, step)` labels in order.
    pub fn labels(&self) -> Vec<(String, Option<String>)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| (event.event.to_string(), event.step.map(str::to_string)))
            .collect()
    }

    /// Returns a copy of the captured events.
    pub fn events(&self) -> Vec<MigrationAuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl MigrationAuditSink for RecordingAuditSink {
    fn record(&self, event: &MigrationAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
