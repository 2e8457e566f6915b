// crates/registry-migrate-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards and section validation.
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

//! Config load validation tests for registry-migrate-config.

#![allow(clippy::use_debug, reason = "Test failure messages include debug output.")]

mod common;

use std::io::Write;
use std::path::Path;

use registry_migrate_config::AuditSinkKind;
use registry_migrate_config::ConfigError;
use registry_migrate_config::MigrateConfig;
use registry_migrate_core::JournalMode;
use registry_migrate_core::SyncMode;
use tempfile::NamedTempFile;

use crate::common::ConfigDir;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<MigrateConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

#[test]
fn load_accepts_full_config() -> TestResult {
    let dir = ConfigDir::new();
    let audit_path = dir.dir.path().join("audit.log");
    let path = dir.write(&format!(
        "[store]\npath = \"{}\"\nbusy_timeout_ms = 250\njournal_mode = \"delete\"\nsync_mode = \
         \"normal\"\n\n[audit]\nsink = \"file\"\npath = \"{}\"\n",
        dir.store_toml(),
        audit_path.display().to_string().replace('\\', "\\\\")
    ));
    let config = MigrateConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    let store = config.store_config().map_err(|err| err.to_string())?;
    if store.path != dir.store
        || store.busy_timeout_ms != 250
        || store.journal_mode != Some(JournalMode::Delete)
        || store.sync_mode != SyncMode::Normal
    {
        return Err(format!("unexpected store config: {store:?}"));
    }
    if config.audit.sink != AuditSinkKind::File || config.audit.path.as_deref() != Some(audit_path.as_path())
    {
        return Err("unexpected audit config".to_string());
    }
    Ok(())
}

#[test]
fn load_applies_defaults() -> TestResult {
    let dir = ConfigDir::new();
    let path = dir.write(&format!("[store]\npath = \"{}\"\n", dir.store_toml()));
    let config = MigrateConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    let store = config.store_config().map_err(|err| err.to_string())?;
    if store.busy_timeout_ms != 5_000
        || store.journal_mode.is_some()
        || store.sync_mode != SyncMode::Full
        || config.audit.sink != AuditSinkKind::Stderr
    {
        return Err(format!("unexpected defaults: {config:?}"));
    }
    Ok(())
}

#[test]
fn load_requires_store_path() -> TestResult {
    let dir = ConfigDir::new();
    let path = dir.write("[audit]\nsink = \"none\"\n");
    assert_invalid(MigrateConfig::load(Some(&path)), "store.path is required")
}

#[test]
fn load_rejects_missing_store_file() -> TestResult {
    let dir = ConfigDir::new();
    let path = dir.write("[store]\npath = \"does-not-exist.db\"\n");
    assert_invalid(MigrateConfig::load(Some(&path)), "does not name an existing file")
}

#[test]
fn load_rejects_busy_timeout_out_of_range() -> TestResult {
    let dir = ConfigDir::new();
    for timeout in [0_u64, 600_001] {
        let path = dir.write(&format!(
            "[store]\npath = \"{}\"\nbusy_timeout_ms = {timeout}\n",
            dir.store_toml()
        ));
        assert_invalid(MigrateConfig::load(Some(&path)), "busy_timeout_ms")?;
    }
    Ok(())
}

#[test]
fn load_rejects_unknown_keys_and_modes() -> TestResult {
    let dir = ConfigDir::new();
    let path = dir.write(&format!("[store]\npath = \"{}\"\nmode = \"fast\"\n", dir.store_toml()));
    assert_invalid(MigrateConfig::load(Some(&path)), "config parse error")?;
    let path =
        dir.write(&format!("[store]\npath = \"{}\"\njournal_mode = \"memory\"\n", dir.store_toml()));
    assert_invalid(MigrateConfig::load(Some(&path)), "config parse error")
}

#[test]
fn load_requires_audit_path_for_file_sink() -> TestResult {
    let dir = ConfigDir::new();
    let path =
        dir.write(&format!("[store]\npath = \"{}\"\n\n[audit]\nsink = \"file\"\n", dir.store_toml()));
    assert_invalid(MigrateConfig::load(Some(&path)), "audit.path is required")
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(MigrateConfig::load(Some(Path::new(&long_path))), "config path exceeds max length")
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(
        MigrateConfig::load(Some(Path::new(&long_component))),
        "config path component too long",
    )
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'#'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(MigrateConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(MigrateConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_reports_missing_explicit_file_as_io() -> TestResult {
    let dir = ConfigDir::new();
    let missing = dir.dir.path().join("absent.toml");
    assert_invalid(MigrateConfig::load(Some(&missing)), "config io error")
}

#[test]
fn store_override_replaces_configured_path() -> TestResult {
    let dir = ConfigDir::new();
    let path = dir.write("[store]\npath = \"stale.db\"\n");
    let config = MigrateConfig::load_with_store(Some(&path), Some(&dir.store))
        .map_err(|err| err.to_string())?;
    if config.store.path.as_deref() != Some(dir.store.as_path()) {
        return Err("override was not applied".to_string());
    }
    Ok(())
}

#[test]
fn store_override_still_reads_explicit_config() -> TestResult {
    let dir = ConfigDir::new();
    let missing = dir.dir.path().join("absent.toml");
    assert_invalid(MigrateConfig::load_with_store(Some(&missing), Some(&dir.store)), "config io error")
}
