// crates/registry-migrate-core/src/lib.rs
// ============================================================================
// Module: Registry Migrate Core
// Description: Reconciliation core for the schema registry v2 migration.
// Purpose: Reshape a legacy registry history store into the v2 commit model.
// Dependencies: rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate rewrites a legacy schema registry store (projects, targets,
//! commits, versions and the `version_commit` join table) into the v2 shape
//! in a single irreversible `SQLite` transaction. Every commit gains an
//! `action` (`ADD`, `MODIFY` or `N/A`) and a `service_url` taken from the
//! self-pairing join row of its version; the legacy `valid`, `service` and
//! `content` columns are renamed without touching their values.
//!
//! The same reconciliation is available in memory through
//! [`Migrator::plan`] so operators can preview the outcome before running
//! the migration.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod classifier;
pub mod error;
pub mod executor;
pub mod model;
pub mod renamer;
pub mod resolver;
pub mod shape;
pub mod snapshot;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::MigrationAuditEvent;
pub use audit::MigrationAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use error::MigrationError;
pub use executor::ActionCounts;
pub use executor::CancelHandle;
pub use executor::EntityCounts;
pub use executor::MigrationPlan;
pub use executor::MigrationReport;
pub use executor::Migrator;
pub use executor::PlannedCommit;
pub use executor::PlannedVersion;
pub use model::CommitAction;
pub use model::CommitId;
pub use model::ProjectId;
pub use model::ProjectKind;
pub use model::TargetId;
pub use model::VersionId;
pub use shape::SchemaShape;
pub use shape::VerificationReport;
pub use snapshot::LegacySnapshot;
pub use store::JournalMode;
pub use store::StoreConfig;
pub use store::SyncMode;
