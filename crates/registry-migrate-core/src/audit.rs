// crates/registry-migrate-core/src/audit.rs
// ============================================================================
// Module: Migration Audit Logging
// Description: Structured audit events for migration runs.
// Purpose: Emit JSON-line progress and outcome records without hard deps.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The executor reports each phase of a run to a [`MigrationAuditSink`].
//! Events are plain `serde` structs written as JSON lines so operators can
//! route them to whatever log pipeline they already run. Events carry counts
//! and labels only; SDL payloads never leave the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::error::MigrationError;
use crate::executor::MigrationReport;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Migration audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Store locator the run targets.
    pub store: String,
    /// Executor step label for progress events.
    pub step: Option<&'static str>,
    /// Outcome label (`ok` or `error`).
    pub outcome: &'static str,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Optional human-readable detail.
    pub message: Option<String>,
    /// Final counts for committed or planned runs.
    pub report: Option<MigrationReport>,
}

impl MigrationAuditEvent {
    /// Creates an event with a consistent timestamp and an `ok` outcome.
    #[must_use]
    pub fn new(event: &'static str, store: &str) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            store: store.to_string(),
            step: None,
            outcome: "ok",
            error_kind: None,
            message: None,
            report: None,
        }
    }

    /// Creates a progress event for an executor step.
    #[must_use]
    pub fn step(store: &str, step: &'static str) -> Self {
        let mut event = Self::new("migration_step", store);
        event.step = Some(step);
        event
    }

    /// Creates an abort event from the failure that caused it.
    #[must_use]
    pub fn aborted(store: &str, error: &MigrationError) -> Self {
        let mut event = Self::new("migration_aborted", store);
        event.outcome = "error";
        event.error_kind = Some(error.kind());
        event.message = Some(error.to_string());
        event
    }

    /// Attaches a report to the event.
    #[must_use]
    pub fn with_report(mut self, report: MigrationReport) -> Self {
        self.report = Some(report);
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for migration events.
pub trait MigrationAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &MigrationAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl MigrationAuditSink for StderrAuditSink {
    fn record(&self, event: &MigrationAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl MigrationAuditSink for FileAuditSink {
    fn record(&self, event: &MigrationAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl MigrationAuditSink for NoopAuditSink {
    fn record(&self, _event: &MigrationAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
