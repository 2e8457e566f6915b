// crates/registry-migrate-core/src/snapshot.rs
// ============================================================================
// Module: Legacy Snapshot
// Description: Bulk reads and integrity checks over the legacy registry tables.
// Purpose: Give the planner one consistent in-memory view of the history.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! [`check_integrity`] runs the referential checks the migration depends on
//! as set queries, before anything is computed or written. A breach aborts
//! the run; rows are never skipped.
//!
//! [`LegacySnapshot::load`] reads each legacy table with a single `SELECT`
//! ordered by insertion order. Commits are ranked inside the store, so
//! `created_at` may hold integers or text timestamps. The snapshot feeds the
//! planner and tests; the executor never pulls rows out of the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::error::MigrationError;
use crate::model::CommitId;
use crate::model::CommitRecord;
use crate::model::PairingRecord;
use crate::model::ProjectId;
use crate::model::ProjectKind;
use crate::model::ProjectRecord;
use crate::model::TargetId;
use crate::model::TargetRecord;
use crate::model::VersionId;
use crate::model::VersionRecord;
use crate::shape::count_column;

// ============================================================================
// SECTION: Integrity Checks
// ============================================================================

/// Referential checks as (description, query returning the first offender id).
const INTEGRITY_CHECKS: [(&str, &str); 4] = [
    (
        "project has unknown kind",
        "SELECT CAST(id AS TEXT) FROM projects \
         WHERE type IS NULL OR type NOT IN ('SINGLE', 'CUSTOM', 'FEDERATION', 'STITCHING') LIMIT 1",
    ),
    (
        "target references missing project",
        "SELECT CAST(t.id AS TEXT) FROM targets t LEFT JOIN projects p ON p.id = t.project_id \
         WHERE p.id IS NULL LIMIT 1",
    ),
    (
        "commit references missing target",
        "SELECT CAST(c.id AS TEXT) FROM commits c LEFT JOIN targets t ON t.id = c.target_id \
         WHERE t.id IS NULL LIMIT 1",
    ),
    (
        "version references missing commit",
        "SELECT CAST(v.id AS TEXT) FROM versions v LEFT JOIN commits c ON c.id = v.commit_id \
         WHERE c.id IS NULL LIMIT 1",
    ),
];

/// Verifies the legacy rows reference each other consistently.
///
/// # Errors
///
/// Returns [`MigrationError::Inconsistent`] naming the first offending row.
pub fn check_integrity(connection: &Connection) -> Result<(), MigrationError> {
    for (description, sql) in INTEGRITY_CHECKS {
        let offender: Option<String> =
            connection.query_row(sql, params![], |row| row.get(0)).optional()?;
        if let Some(id) = offender {
            return Err(MigrationError::Inconsistent(format!("{description}: {id}")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Snapshot Queries
// ============================================================================

/// Projects in insertion order.
const PROJECTS_SQL: &str = "SELECT CAST(id AS TEXT), type FROM projects ORDER BY rowid";

/// Targets in insertion order.
const TARGETS_SQL: &str =
    "SELECT CAST(id AS TEXT), CAST(project_id AS TEXT) FROM targets ORDER BY rowid";

/// Commits in insertion order, each ranked within its target by the store's
/// own ordering of `created_at`.
const COMMITS_SQL: &str = "SELECT CAST(id AS TEXT),
       CAST(target_id AS TEXT),
       ROW_NUMBER() OVER (PARTITION BY target_id ORDER BY created_at ASC, rowid ASC),
       service
FROM commits
ORDER BY rowid";

/// Versions in insertion order.
const VERSIONS_SQL: &str =
    "SELECT CAST(id AS TEXT), CAST(commit_id AS TEXT), valid FROM versions ORDER BY rowid";

/// Join rows in insertion order.
const PAIRINGS_SQL: &str = "SELECT CAST(version_id AS TEXT), CAST(commit_id AS TEXT), url \
                            FROM version_commit ORDER BY rowid";

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// In-memory copy of the legacy rows the reconciliation reads.
///
/// # Invariants
/// - Every vector is ordered by store insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacySnapshot {
    /// Legacy projects.
    pub projects: Vec<ProjectRecord>,
    /// Legacy targets.
    pub targets: Vec<TargetRecord>,
    /// Legacy commits.
    pub commits: Vec<CommitRecord>,
    /// Legacy versions.
    pub versions: Vec<VersionRecord>,
    /// Legacy join rows.
    pub pairings: Vec<PairingRecord>,
}

impl LegacySnapshot {
    /// Reads the legacy tables in bulk.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Inconsistent`] for unknown project kinds and
    /// [`MigrationError::Db`] when the legacy columns cannot be read.
    pub fn load(connection: &Connection) -> Result<Self, MigrationError> {
        let mut projects = Vec::new();
        {
            let mut stmt = connection.prepare(PROJECTS_SQL)?;
            let rows = stmt.query_map(params![], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (id, kind) = row?;
                let kind = kind.parse::<ProjectKind>().map_err(|err| {
                    MigrationError::Inconsistent(format!("project {id}: {err}"))
                })?;
                projects.push(ProjectRecord {
                    id: ProjectId::new(id),
                    kind,
                });
            }
        }

        let targets = {
            let mut stmt = connection.prepare(TARGETS_SQL)?;
            let rows = stmt.query_map(params![], |row| {
                Ok(TargetRecord {
                    id: TargetId::new(row.get::<_, String>(0)?),
                    project_id: ProjectId::new(row.get::<_, String>(1)?),
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let commits = {
            let mut stmt = connection.prepare(COMMITS_SQL)?;
            let rows = stmt.query_map(params![], |row| {
                Ok(CommitRecord {
                    id: CommitId::new(row.get::<_, String>(0)?),
                    target_id: TargetId::new(row.get::<_, String>(1)?),
                    sequence: count_column(row, 2)?,
                    service: row.get(3)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let versions = {
            let mut stmt = connection.prepare(VERSIONS_SQL)?;
            let rows = stmt.query_map(params![], |row| {
                Ok(VersionRecord {
                    id: VersionId::new(row.get::<_, String>(0)?),
                    commit_id: CommitId::new(row.get::<_, String>(1)?),
                    valid: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let pairings = {
            let mut stmt = connection.prepare(PAIRINGS_SQL)?;
            let rows = stmt.query_map(params![], |row| {
                Ok(PairingRecord {
                    version_id: VersionId::new(row.get::<_, String>(0)?),
                    commit_id: CommitId::new(row.get::<_, String>(1)?),
                    url: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            projects,
            targets,
            commits,
            versions,
            pairings,
        })
    }

    /// Returns the project kind owning each target.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Inconsistent`] when a target's project is absent.
    pub fn target_kinds(&self) -> Result<BTreeMap<&TargetId, ProjectKind>, MigrationError> {
        let kinds: BTreeMap<&ProjectId, ProjectKind> =
            self.projects.iter().map(|project| (&project.id, project.kind)).collect();
        self.targets
            .iter()
            .map(|target| {
                kinds.get(&target.project_id).map(|kind| (&target.id, *kind)).ok_or_else(|| {
                    MigrationError::Inconsistent(format!(
                        "target references missing project: {}",
                        target.id
                    ))
                })
            })
            .collect()
    }
}
