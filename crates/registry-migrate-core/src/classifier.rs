// crates/registry-migrate-core/src/classifier.rs
// ============================================================================
// Module: Service-History Classifier
// Description: Derives ADD / MODIFY / N/A for every legacy commit.
// Purpose: Record whether a commit introduced or changed a service in a target.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! Commits of service-scoped projects (federation, stitching) are grouped by
//! `(target, service)` and ranked by `created_at`, with the store's insertion
//! order as the tiebreak. Rank one is `ADD`, every later rank is `MODIFY`.
//! Commits of any other project kind are `N/A`, whatever `service` holds.
//!
//! The executor stages the ranking server-side with a window function; the
//! in-memory [`classify_target`] applies the identical rule for plans, over
//! the per-target sequence the snapshot ranks with the same ordering.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use rusqlite::Connection;
use rusqlite::params;

use crate::error::MigrationError;
use crate::model::CommitAction;
use crate::model::CommitId;
use crate::model::CommitRecord;
use crate::model::ProjectKind;
use crate::model::TargetId;
use crate::snapshot::LegacySnapshot;

// ============================================================================
// SECTION: SQL
// ============================================================================

/// Creates the staging table holding one action per commit.
const CREATE_STAGE_SQL: &str = "CREATE TEMP TABLE migration_commit_actions (
    commit_id NOT NULL PRIMARY KEY,
    action TEXT NOT NULL
);";

/// Ranks every commit inside its `(target, service)` partition.
const STAGE_ACTIONS_SQL: &str = "INSERT INTO temp.migration_commit_actions (commit_id, action)
SELECT c.id,
       CASE
           WHEN p.type IN ('FEDERATION', 'STITCHING') THEN
               CASE ROW_NUMBER() OVER (
                        PARTITION BY c.target_id, c.service
                        ORDER BY c.created_at ASC, c.rowid ASC)
                   WHEN 1 THEN 'ADD'
                   ELSE 'MODIFY'
               END
           ELSE 'N/A'
       END
FROM commits c
JOIN targets t ON t.id = c.target_id
JOIN projects p ON p.id = t.project_id";

/// Adds and fills the v2 `commits.action` column from the staging table.
const APPLY_ACTIONS_SQL: &str = "ALTER TABLE commits ADD COLUMN action TEXT;
UPDATE commits SET action = a.action
FROM temp.migration_commit_actions a
WHERE a.commit_id = commits.id;
DROP TABLE temp.migration_commit_actions;";

// ============================================================================
// SECTION: Store Operations
// ============================================================================

/// Computes every commit's action into a temporary staging table.
///
/// Must run while the legacy `service` column is still present.
///
/// # Errors
///
/// Returns [`MigrationError`] when the staging statements fail.
pub(crate) fn stage_actions(connection: &Connection) -> Result<usize, MigrationError> {
    connection.execute_batch(CREATE_STAGE_SQL)?;
    Ok(connection.execute(STAGE_ACTIONS_SQL, params![])?)
}

/// Adds `commits.action` and populates it from the staged actions.
///
/// # Errors
///
/// Returns [`MigrationError`] when the column cannot be added or filled.
pub(crate) fn apply_actions(connection: &Connection) -> Result<(), MigrationError> {
    connection.execute_batch(APPLY_ACTIONS_SQL)?;
    Ok(())
}

// ============================================================================
// SECTION: In-Memory Classification
// ============================================================================

/// Classifies the commits of a single target.
///
/// Results follow each commit's `sequence` within the target.
#[must_use]
pub fn classify_target(
    kind: ProjectKind,
    commits: &[&CommitRecord],
) -> Vec<(CommitId, CommitAction)> {
    let mut ordered = commits.to_vec();
    ordered.sort_by_key(|commit| commit.sequence);
    if !kind.is_service_scoped() {
        return ordered
            .into_iter()
            .map(|commit| (commit.id.clone(), CommitAction::NotApplicable))
            .collect();
    }
    let mut added: BTreeSet<Option<&str>> = BTreeSet::new();
    ordered
        .into_iter()
        .map(|commit| {
            let action = if added.insert(commit.service.as_deref()) {
                CommitAction::Add
            } else {
                CommitAction::Modify
            };
            (commit.id.clone(), action)
        })
        .collect()
}

/// Classifies every commit of a snapshot, target by target.
///
/// # Errors
///
/// Returns [`MigrationError::Inconsistent`] when a commit's target or a
/// target's project is missing from the snapshot.
pub fn classify_snapshot(
    snapshot: &LegacySnapshot,
) -> Result<BTreeMap<CommitId, CommitAction>, MigrationError> {
    let kinds = snapshot.target_kinds()?;
    let mut by_target: BTreeMap<&TargetId, Vec<&CommitRecord>> = BTreeMap::new();
    for commit in &snapshot.commits {
        if !kinds.contains_key(&commit.target_id) {
            return Err(MigrationError::Inconsistent(format!(
                "commit references missing target: {}",
                commit.id
            )));
        }
        by_target.entry(&commit.target_id).or_default().push(commit);
    }
    let mut actions = BTreeMap::new();
    for (target_id, commits) in by_target {
        let kind = kinds.get(target_id).copied().ok_or_else(|| {
            MigrationError::Inconsistent(format!("target has no project kind: {target_id}"))
        })?;
        actions.extend(classify_target(kind, &commits));
    }
    Ok(actions)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
