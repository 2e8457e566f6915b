// crates/registry-migrate-config/src/config.rs
// ============================================================================
// Module: Registry Migrate Configuration
// Description: TOML configuration model, loading and validation.
// Purpose: Resolve store and audit settings before a migration is attempted.
// Dependencies: registry-migrate-core, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! The config path resolves from the explicit argument, then the
//! `REGISTRY_MIGRATE_CONFIG` environment variable, then
//! `registry-migrate.toml` in the working directory. Files are capped at
//! 1 MiB and must be UTF-8. Unknown keys are rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use registry_migrate_core::JournalMode;
use registry_migrate_core::StoreConfig;
use registry_migrate_core::SyncMode;
use registry_migrate_core::store::DEFAULT_BUSY_TIMEOUT_MS;
use registry_migrate_core::store::MAX_BUSY_TIMEOUT_MS;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "registry-migrate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "REGISTRY_MIGRATE_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Top-level migration tool configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrateConfig {
    /// Registry store settings.
    #[serde(default)]
    pub store: StoreSection,
    /// Audit event settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl MigrateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        let config = read_config(&resolved)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration and applies a command-line store override.
    ///
    /// When the store is overridden and no config file was named explicitly
    /// or through the environment, a missing default file falls back to the
    /// built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with_store(
        path: Option<&Path>,
        store_override: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let named = path.is_some() || env::var_os(CONFIG_ENV_VAR).is_some();
        let resolved = resolve_path(path)?;
        let mut config = if store_override.is_some() && !named && !resolved.exists() {
            Self::default()
        } else {
            read_config(&resolved)?
        };
        if let Some(store) = store_override {
            config.store.path = Some(store.to_path_buf());
        }
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.audit.validate()
    }

    /// Builds the store connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when no store path is configured.
    pub fn store_config(&self) -> Result<StoreConfig, ConfigError> {
        let path = self.store.path.clone().ok_or_else(missing_store_path)?;
        Ok(StoreConfig {
            path,
            busy_timeout_ms: self.store.busy_timeout_ms,
            journal_mode: self.store.journal_mode,
            sync_mode: self.store.sync_mode,
        })
    }
}

/// `[store]` section.
///
/// # Invariants
/// - `path` names an existing file once validated.
/// - `busy_timeout_ms` is in `1..=MAX_BUSY_TIMEOUT_MS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// `SQLite` database path of the legacy registry.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode to switch to after a committed run; unset keeps the store's.
    #[serde(default)]
    pub journal_mode: Option<JournalMode>,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SyncMode,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: None,
            sync_mode: SyncMode::default(),
        }
    }
}

impl StoreSection {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let path = self.path.as_ref().ok_or_else(missing_store_path)?;
        validate_path_string("store.path", &path.to_string_lossy())?;
        if !path.is_file() {
            return Err(ConfigError::Invalid(format!(
                "store.path does not name an existing file: {}",
                path.display()
            )));
        }
        if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store.busy_timeout_ms must be between 1 and {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Audit events are discarded.
    None,
}

/// `[audit]` section.
///
/// # Invariants
/// - `path` is set exactly when `sink = "file"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink receiving audit events.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (_, Some(_)) => Err(ConfigError::Invalid(
                "audit.path is only allowed with the file sink".to_string(),
            )),
            (_, None) => Ok(()),
        }
    }
}

/// Default busy timeout for serde.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Reads and parses a config file without validating it.
fn read_config(path: &Path) -> Result<MigrateConfig, ConfigError> {
    validate_path(path)?;
    let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    let content = std::str::from_utf8(&bytes)
        .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
    toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Error for a configuration without a store path.
fn missing_store_path() -> ConfigError {
    ConfigError::Invalid("store.path is required".to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
