// crates/registry-migrate-core/src/resolver.rs
// ============================================================================
// Module: Attribution Resolver
// Description: Resolves each commit's service URL from its self-pairing row.
// Purpose: Denormalize join-table URLs onto the commit that produced them.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! A version may be composed of several services' commits, one
//! `version_commit` row per contribution. Only the *self-pairing* row, keyed
//! by `(version.id, version.commit_id)`, attributes a URL, and only to the
//! version's own commit. Sibling rows never leak into another commit's
//! `service_url`; those commits are resolved through their own versions.
//!
//! A missing self-pairing row, or one without a URL, leaves `service_url`
//! null. There is no fallback to other rows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::error::MigrationError;
use crate::model::CommitId;
use crate::model::VersionId;
use crate::snapshot::LegacySnapshot;

// ============================================================================
// SECTION: SQL
// ============================================================================

/// Finds a commit whose self-pairing rows disagree on the URL.
const CONFLICT_SQL: &str = "SELECT CAST(v.commit_id AS TEXT)
FROM versions v
JOIN version_commit vc ON vc.version_id = v.id AND vc.commit_id = v.commit_id
GROUP BY v.commit_id
HAVING COUNT(DISTINCT vc.url) > 1
LIMIT 1";

/// Creates the staging table holding one URL per attributed commit.
const CREATE_STAGE_SQL: &str = "CREATE TEMP TABLE migration_commit_urls (
    commit_id NOT NULL PRIMARY KEY,
    service_url TEXT
);";

/// Collects the self-pairing URL for every version's own commit.
const STAGE_URLS_SQL: &str = "INSERT INTO temp.migration_commit_urls (commit_id, service_url)
SELECT v.commit_id, MAX(vc.url)
FROM versions v
JOIN version_commit vc ON vc.version_id = v.id AND vc.commit_id = v.commit_id
GROUP BY v.commit_id";

/// Adds and fills the v2 `commits.service_url` column from the staging table.
const APPLY_URLS_SQL: &str = "ALTER TABLE commits ADD COLUMN service_url TEXT;
UPDATE commits SET service_url = u.service_url
FROM temp.migration_commit_urls u
WHERE u.commit_id = commits.id;
DROP TABLE temp.migration_commit_urls;";

/// Deletes every join row that is not a version's self-pairing.
const RETIRE_PAIRINGS_SQL: &str = "DELETE FROM version_commit
WHERE NOT EXISTS (
    SELECT 1 FROM versions v
    WHERE v.id = version_commit.version_id AND v.commit_id = version_commit.commit_id
)";

/// Drops the retired join-table URL column.
const DROP_URL_SQL: &str = "ALTER TABLE version_commit DROP COLUMN url;";

// ============================================================================
// SECTION: Store Operations
// ============================================================================

/// Rejects stores where one commit carries conflicting self-pairing URLs.
///
/// # Errors
///
/// Returns [`MigrationError::Inconsistent`] naming the conflicting commit.
pub(crate) fn check_conflicts(connection: &Connection) -> Result<(), MigrationError> {
    let conflict: Option<String> =
        connection.query_row(CONFLICT_SQL, params![], |row| row.get(0)).optional()?;
    match conflict {
        Some(commit_id) => Err(MigrationError::Inconsistent(format!(
            "commit has conflicting self-pairing urls: {commit_id}"
        ))),
        None => Ok(()),
    }
}

/// Resolves self-pairing URLs into a temporary staging table.
///
/// # Errors
///
/// Returns [`MigrationError`] when the staging statements fail.
pub(crate) fn stage_urls(connection: &Connection) -> Result<usize, MigrationError> {
    connection.execute_batch(CREATE_STAGE_SQL)?;
    Ok(connection.execute(STAGE_URLS_SQL, params![])?)
}

/// Adds `commits.service_url` and populates it from the staged URLs.
///
/// # Errors
///
/// Returns [`MigrationError`] when the column cannot be added or filled.
pub(crate) fn apply_urls(connection: &Connection) -> Result<(), MigrationError> {
    connection.execute_batch(APPLY_URLS_SQL)?;
    Ok(())
}

/// Retires non-self join rows and the join-table URL column.
///
/// Returns the number of retired rows.
///
/// # Errors
///
/// Returns [`MigrationError`] when the rows or column cannot be removed.
pub(crate) fn retire_pairings(connection: &Connection) -> Result<usize, MigrationError> {
    let retired = connection.execute(RETIRE_PAIRINGS_SQL, params![])?;
    connection.execute_batch(DROP_URL_SQL)?;
    Ok(retired)
}

// ============================================================================
// SECTION: In-Memory Resolution
// ============================================================================

/// Resolves the `service_url` of every commit in a snapshot.
///
/// Commits that are no version's own commit, or whose self-pairing is
/// absent, map to `None`.
///
/// # Errors
///
/// Returns [`MigrationError::Inconsistent`] when one commit has self-pairing
/// rows with different URLs.
pub fn resolve_snapshot(
    snapshot: &LegacySnapshot,
) -> Result<BTreeMap<CommitId, Option<String>>, MigrationError> {
    let own_commits = own_commits(snapshot);
    let mut urls: BTreeMap<&CommitId, BTreeSet<&str>> = BTreeMap::new();
    for pairing in &snapshot.pairings {
        if own_commits.get(&pairing.version_id) != Some(&&pairing.commit_id) {
            continue;
        }
        let entry = urls.entry(&pairing.commit_id).or_default();
        if let Some(url) = pairing.url.as_deref() {
            entry.insert(url);
        }
    }
    let mut resolved = BTreeMap::new();
    for commit in &snapshot.commits {
        let url = match urls.get(&commit.id) {
            Some(candidates) if candidates.len() > 1 => {
                return Err(MigrationError::Inconsistent(format!(
                    "commit has conflicting self-pairing urls: {}",
                    commit.id
                )));
            }
            Some(candidates) => candidates.first().map(|url| (*url).to_string()),
            None => None,
        };
        resolved.insert(commit.id.clone(), url);
    }
    Ok(resolved)
}

/// Counts the join rows the migration retires.
#[must_use]
pub fn retired_pairing_count(snapshot: &LegacySnapshot) -> usize {
    let own_commits = own_commits(snapshot);
    snapshot
        .pairings
        .iter()
        .filter(|pairing| own_commits.get(&pairing.version_id) != Some(&&pairing.commit_id))
        .count()
}

/// Maps each version to its own commit.
fn own_commits(snapshot: &LegacySnapshot) -> BTreeMap<&VersionId, &CommitId> {
    snapshot.versions.iter().map(|version| (&version.id, &version.commit_id)).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
