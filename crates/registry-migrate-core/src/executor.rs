// crates/registry-migrate-core/src/executor.rs
// ============================================================================
// Module: Migration Executor
// Description: Runs the registry v2 reshaping as one exclusive transaction.
// Purpose: Move a store from the legacy shape to v2 atomically, or not at all.
// Dependencies: rusqlite, serde
// ============================================================================

//! ## Overview
//! [`Migrator::run`] takes an exclusive lock, checks the legacy shape and the
//! referential integrity of the history, stages every commit's action and
//! URL into temporary tables, applies the renames and new columns, retires
//! the non-self join rows, re-checks the row counts, and commits. Any failure
//! drops the transaction, which rolls the store back to its legacy state.
//!
//! [`Migrator::plan`] computes the identical outcome in memory from one read
//! snapshot without writing anything.
//!
//! Security posture: store contents are untrusted; every breach fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use rusqlite::Connection;
use rusqlite::InterruptHandle;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Serialize;

use crate::audit::MigrationAuditEvent;
use crate::audit::MigrationAuditSink;
use crate::audit::NoopAuditSink;
use crate::classifier;
use crate::error::MigrationError;
use crate::model::CommitAction;
use crate::model::CommitId;
use crate::model::TargetId;
use crate::model::VersionId;
use crate::renamer;
use crate::resolver;
use crate::shape;
use crate::shape::VerificationReport;
use crate::shape::count_column;
use crate::snapshot;
use crate::snapshot::LegacySnapshot;
use crate::store::JournalMode;
use crate::store::StoreConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Row counts of every entity table in one statement.
const ENTITY_COUNTS_SQL: &str = "SELECT (SELECT COUNT(*) FROM projects),
       (SELECT COUNT(*) FROM targets),
       (SELECT COUNT(*) FROM commits),
       (SELECT COUNT(*) FROM versions)";

/// Per-action commit counts after population.
const ACTION_COUNTS_SQL: &str = "SELECT COUNT(*) FILTER (WHERE action = 'ADD'),
       COUNT(*) FILTER (WHERE action = 'MODIFY'),
       COUNT(*) FILTER (WHERE action = 'N/A'),
       COUNT(*) FILTER (WHERE action IS NULL),
       COUNT(*) FILTER (WHERE service_url IS NOT NULL)
FROM commits";

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Row counts of the entity tables, unchanged by the migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    /// Projects.
    pub projects: u64,
    /// Targets.
    pub targets: u64,
    /// Commits.
    pub commits: u64,
    /// Versions.
    pub versions: u64,
}

impl EntityCounts {
    /// Reads the counts from the store.
    fn read(connection: &Connection) -> Result<Self, MigrationError> {
        Ok(connection.query_row(ENTITY_COUNTS_SQL, params![], |row| {
            Ok(Self {
                projects: count_column(row, 0)?,
                targets: count_column(row, 1)?,
                commits: count_column(row, 2)?,
                versions: count_column(row, 3)?,
            })
        })?)
    }

    /// Counts the rows of a snapshot.
    fn of_snapshot(snapshot: &LegacySnapshot) -> Self {
        Self {
            projects: count(snapshot.projects.len()),
            targets: count(snapshot.targets.len()),
            commits: count(snapshot.commits.len()),
            versions: count(snapshot.versions.len()),
        }
    }
}

/// Number of commits per action label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    /// `ADD` commits.
    pub add: u64,
    /// `MODIFY` commits.
    pub modify: u64,
    /// `N/A` commits.
    pub not_applicable: u64,
}

impl ActionCounts {
    /// Adds one commit with `action`.
    const fn record(&mut self, action: CommitAction) {
        match action {
            CommitAction::Add => self.add += 1,
            CommitAction::Modify => self.modify += 1,
            CommitAction::NotApplicable => self.not_applicable += 1,
        }
    }
}

/// Summary of a committed or planned migration.
///
/// # Invariants
/// - `actions` sums to `entity_counts.commits`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Entity row counts.
    pub entity_counts: EntityCounts,
    /// Commits per action.
    pub actions: ActionCounts,
    /// Commits that received a `service_url`.
    pub commits_with_service_url: u64,
    /// Non-self join rows removed.
    pub pairings_retired: u64,
    /// Self-pairing join rows kept.
    pub pairings_retained: u64,
}

/// Outcome the migration would produce for one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCommit {
    /// Commit identifier.
    pub commit_id: CommitId,
    /// Owning target.
    pub target_id: TargetId,
    /// Value carried into `service_name`.
    pub service_name: Option<String>,
    /// Value written to `action`.
    pub action: CommitAction,
    /// Value written to `service_url`.
    pub service_url: Option<String>,
}

/// Outcome the migration would produce for one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedVersion {
    /// Version identifier.
    pub version_id: VersionId,
    /// Own commit.
    pub commit_id: CommitId,
    /// Value carried into `is_composable`.
    pub is_composable: bool,
}

/// Full in-memory reconciliation of a legacy store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    /// Summary counts.
    pub report: MigrationReport,
    /// Per-commit outcome in store insertion order.
    pub commits: Vec<PlannedCommit>,
    /// Per-version outcome in store insertion order.
    pub versions: Vec<PlannedVersion>,
}

impl MigrationPlan {
    /// Reconciles a snapshot without touching any store.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Inconsistent`] when the snapshot breaks
    /// referential integrity or carries conflicting self-pairing URLs.
    pub fn from_snapshot(snapshot: &LegacySnapshot) -> Result<Self, MigrationError> {
        let actions = classifier::classify_snapshot(snapshot)?;
        let mut urls = resolver::resolve_snapshot(snapshot)?;
        let composability = renamer::renamed_composability(snapshot);
        let retired = resolver::retired_pairing_count(snapshot);

        let mut action_counts = ActionCounts::default();
        let mut commits = Vec::with_capacity(snapshot.commits.len());
        for commit in &snapshot.commits {
            let action = actions.get(&commit.id).copied().ok_or_else(|| {
                MigrationError::Inconsistent(format!("commit was not classified: {}", commit.id))
            })?;
            action_counts.record(action);
            commits.push(PlannedCommit {
                commit_id: commit.id.clone(),
                target_id: commit.target_id.clone(),
                service_name: commit.service.clone(),
                action,
                service_url: urls.remove(&commit.id).flatten(),
            });
        }

        let commit_ids: BTreeSet<&CommitId> =
            snapshot.commits.iter().map(|commit| &commit.id).collect();
        let mut versions = Vec::with_capacity(snapshot.versions.len());
        for version in &snapshot.versions {
            if !commit_ids.contains(&version.commit_id) {
                return Err(MigrationError::Inconsistent(format!(
                    "version references missing commit: {}",
                    version.id
                )));
            }
            versions.push(PlannedVersion {
                version_id: version.id.clone(),
                commit_id: version.commit_id.clone(),
                is_composable: composability.get(&version.id).copied().unwrap_or(version.valid),
            });
        }

        let commits_with_service_url =
            count(commits.iter().filter(|commit| commit.service_url.is_some()).count());
        let report = MigrationReport {
            entity_counts: EntityCounts::of_snapshot(snapshot),
            actions: action_counts,
            commits_with_service_url,
            pairings_retired: count(retired),
            pairings_retained: count(snapshot.pairings.len().saturating_sub(retired)),
        };
        Ok(Self {
            report,
            commits,
            versions,
        })
    }
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Handle that aborts an in-flight migration.
///
/// # Invariants
/// - Cancellation is sticky: once cancelled, every later run on the same
///   [`Migrator`] fails with [`MigrationError::Cancelled`].
#[derive(Clone)]
pub struct CancelHandle {
    /// Flag checked between executor steps.
    cancelled: Arc<AtomicBool>,
    /// Interrupts the statement currently running on the connection.
    interrupt: Arc<InterruptHandle>,
}

impl CancelHandle {
    /// Creates a handle bound to `connection`.
    fn new(connection: &Connection) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            interrupt: Arc::new(connection.get_interrupt_handle()),
        }
    }

    /// Requests cancellation; the running transaction rolls back.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.interrupt.interrupt();
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails when cancellation was requested.
    fn check(&self) -> Result<(), MigrationError> {
        if self.is_cancelled() { Err(MigrationError::Cancelled) } else { Ok(()) }
    }
}

// ============================================================================
// SECTION: Migrator
// ============================================================================

/// Executes the registry v2 migration against one store connection.
pub struct Migrator {
    /// Store connection owned for the duration of the run.
    connection: Connection,
    /// Store locator used in audit events.
    store_label: String,
    /// Audit sink for progress and outcome events.
    audit: Arc<dyn MigrationAuditSink>,
    /// Cancellation handle bound to `connection`.
    cancel: CancelHandle,
    /// Journal mode switched to after a committed run.
    journal_mode: Option<JournalMode>,
}

impl Migrator {
    /// Wraps an open connection.
    #[must_use]
    pub fn new(connection: Connection, store_label: impl Into<String>) -> Self {
        let cancel = CancelHandle::new(&connection);
        Self {
            connection,
            store_label: store_label.into(),
            audit: Arc::new(NoopAuditSink),
            cancel,
            journal_mode: None,
        }
    }

    /// Opens the configured store.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] when the store cannot be opened.
    pub fn open(config: &StoreConfig) -> Result<Self, MigrationError> {
        let connection = config.open()?;
        let mut migrator = Self::new(connection, config.path.display().to_string());
        migrator.journal_mode = config.journal_mode;
        Ok(migrator)
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn MigrationAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns a handle that cancels runs of this migrator from any thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Returns the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Releases the underlying connection.
    #[must_use]
    pub fn into_connection(self) -> Connection {
        self.connection
    }

    /// Computes the migration outcome without writing.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::SchemaMismatch`] when the store is not in the
    /// legacy shape and [`MigrationError::Inconsistent`] for integrity breaches.
    pub fn plan(&mut self) -> Result<MigrationPlan, MigrationError> {
        self.cancel.check()?;
        let tx = self.connection.transaction_with_behavior(TransactionBehavior::Deferred)?;
        shape::require_legacy(&tx)?;
        snapshot::check_integrity(&tx)?;
        resolver::check_conflicts(&tx)?;
        let legacy = LegacySnapshot::load(&tx)?;
        tx.rollback()?;
        let plan = MigrationPlan::from_snapshot(&legacy)?;
        self.audit.record(
            &MigrationAuditEvent::new("migration_planned", &self.store_label)
                .with_report(plan.report.clone()),
        );
        Ok(plan)
    }

    /// Runs the migration as one exclusive transaction.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] when any step fails; the store is then left
    /// exactly as it was before the call.
    pub fn run(&mut self) -> Result<MigrationReport, MigrationError> {
        self.audit.record(&MigrationAuditEvent::new("migration_started", &self.store_label));
        let reporter = StepReporter {
            store: &self.store_label,
            audit: self.audit.as_ref(),
            cancel: &self.cancel,
        };
        let outcome = execute(&mut self.connection, &reporter);
        match &outcome {
            Ok(report) => {
                self.switch_journal_mode();
                self.audit.record(
                    &MigrationAuditEvent::new("migration_committed", &self.store_label)
                        .with_report(report.clone()),
                );
            }
            Err(err) => self.audit.record(&MigrationAuditEvent::aborted(&self.store_label, err)),
        }
        outcome
    }

    /// Applies the configured journal mode to a committed store.
    ///
    /// A refusal is audited; the committed migration stands.
    fn switch_journal_mode(&self) {
        let Some(mode) = self.journal_mode else {
            return;
        };
        let pragma = format!("PRAGMA journal_mode = {};", mode.pragma_value());
        let mut event = MigrationAuditEvent::step(&self.store_label, "journal_mode");
        if let Err(err) = self.connection.execute_batch(&pragma) {
            let err = MigrationError::from(err);
            event.outcome = "error";
            event.error_kind = Some(err.kind());
            event.message = Some(err.to_string());
        }
        self.audit.record(&event);
    }

    /// Checks the store against the post-migration contract.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::SchemaMismatch`] when the store is not migrated.
    pub fn verify(&self) -> Result<VerificationReport, MigrationError> {
        let report = shape::verify_migrated(&self.connection)?;
        let mut event = MigrationAuditEvent::new("migration_verified", &self.store_label);
        if !report.passed() {
            event.outcome = "error";
            event.message = Some("store violates the v2 contract".to_string());
        }
        self.audit.record(&event);
        Ok(report)
    }
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Emits step events and enforces cancellation between steps.
struct StepReporter<'a> {
    /// Store locator used in audit events.
    store: &'a str,
    /// Audit sink receiving the events.
    audit: &'a dyn MigrationAuditSink,
    /// Cancellation handle checked after each step.
    cancel: &'a CancelHandle,
}

impl StepReporter<'_> {
    /// Records a finished step, then fails if cancellation was requested.
    fn step(&self, step: &'static str) -> Result<(), MigrationError> {
        self.audit.record(&MigrationAuditEvent::step(self.store, step));
        self.cancel.check()
    }
}

/// Applies the full migration inside one exclusive transaction.
fn execute(
    connection: &mut Connection,
    reporter: &StepReporter<'_>,
) -> Result<MigrationReport, MigrationError> {
    reporter.cancel.check()?;
    let tx = connection.transaction_with_behavior(TransactionBehavior::Exclusive)?;

    shape::require_legacy(&tx)?;
    snapshot::check_integrity(&tx)?;
    resolver::check_conflicts(&tx)?;
    let before = EntityCounts::read(&tx)?;
    reporter.step("prechecked")?;

    // Both computations read the legacy `service` column, so they precede the renames.
    classifier::stage_actions(&tx)?;
    resolver::stage_urls(&tx)?;
    reporter.step("computed")?;

    renamer::apply_renames(&tx)?;
    reporter.step("renamed")?;

    classifier::apply_actions(&tx)?;
    resolver::apply_urls(&tx)?;
    reporter.step("populated")?;

    let retired = resolver::retire_pairings(&tx)?;
    reporter.step("pairings_retired")?;

    let report = post_check(&tx, before, retired)?;
    reporter.step("verified")?;

    tx.commit()?;
    Ok(report)
}

/// Confirms entity counts are unchanged and every commit was classified.
fn post_check(
    connection: &Connection,
    before: EntityCounts,
    retired: usize,
) -> Result<MigrationReport, MigrationError> {
    let after = EntityCounts::read(connection)?;
    if after != before {
        return Err(MigrationError::Inconsistent(format!(
            "entity counts changed during migration: commits {} -> {}, versions {} -> {}",
            before.commits, after.commits, before.versions, after.versions
        )));
    }
    let (actions, unclassified, commits_with_service_url) =
        connection.query_row(ACTION_COUNTS_SQL, params![], |row| {
            Ok((
                ActionCounts {
                    add: count_column(row, 0)?,
                    modify: count_column(row, 1)?,
                    not_applicable: count_column(row, 2)?,
                },
                count_column(row, 3)?,
                count_column(row, 4)?,
            ))
        })?;
    if unclassified > 0 {
        return Err(MigrationError::Inconsistent(format!(
            "{unclassified} commits left without an action"
        )));
    }
    Ok(MigrationReport {
        entity_counts: after,
        actions,
        commits_with_service_url,
        pairings_retired: count(retired),
        pairings_retained: shape::scalar(connection, "SELECT COUNT(*) FROM version_commit")?,
    })
}

/// Converts an in-memory length to a report count.
fn count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}
