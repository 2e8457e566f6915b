// crates/registry-migrate-config/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared helpers for registry-migrate-config tests.
// Purpose: Write throwaway config files next to a placeholder store file.
// Dependencies: tempfile
// ============================================================================

//! ## Overview
//! Config validation only checks that the store path names a file, so the
//! placeholder store is an empty file.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    reason = "Test-only helpers are shared across test binaries."
)]

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// Temporary directory holding a placeholder store and config files.
pub struct ConfigDir {
    /// Backing directory.
    pub dir: TempDir,
    /// Placeholder store path.
    pub store: PathBuf,
}

impl ConfigDir {
    /// Creates the directory and an empty placeholder store.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("registry.db");
        fs::write(&store, b"").unwrap();
        Self {
            dir,
            store,
        }
    }

    /// Writes `registry-migrate.toml` with the given contents.
    pub fn write(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join("registry-migrate.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    /// Returns the store path formatted for a TOML string value.
    pub fn store_toml(&self) -> String {
        self.store.display().to_string().replace('\\', "\\\\")
    }
}
