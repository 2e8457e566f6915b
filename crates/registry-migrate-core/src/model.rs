// crates/registry-migrate-core/src/model.rs
// ============================================================================
// Module: Registry Data Model
// Description: Identifiers, project kinds, commit actions and legacy records.
// Purpose: Provide strongly typed views of the legacy registry history rows.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque strings read as text from the store. Records
//! carry only the legacy columns the reconciliation reads. A commit's
//! `sequence` is its rank within its target as the store orders
//! `(created_at, rowid)`, so timestamps of any storage class compare the way
//! the migration's window function compares them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Project identifier.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Creates a new project identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Target identifier.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Creates a new target identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Commit identifier.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    /// Creates a new commit identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Version identifier.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    /// Creates a new version identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Project Kind
// ============================================================================

/// Structural kind of a project.
///
/// # Invariants
/// - Wire labels match the legacy `projects.type` column exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectKind {
    /// One schema per target, no services.
    Single,
    /// Custom composition, no services.
    Custom,
    /// Federated services composed into a supergraph.
    Federation,
    /// Stitched services composed into a gateway schema.
    Stitching,
}

impl ProjectKind {
    /// Every project kind, in declaration order.
    pub const ALL: [Self; 4] = [Self::Single, Self::Custom, Self::Federation, Self::Stitching];

    /// Returns the legacy `projects.type` label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::Custom => "CUSTOM",
            Self::Federation => "FEDERATION",
            Self::Stitching => "STITCHING",
        }
    }

    /// Returns true when commits of this kind are attributed to a named service.
    #[must_use]
    pub const fn is_service_scoped(self) -> bool {
        matches!(self, Self::Federation | Self::Stitching)
    }
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| format!("unknown project kind: {value}"))
    }
}

// ============================================================================
// SECTION: Commit Action
// ============================================================================

/// History action recorded on a v2 commit.
///
/// # Invariants
/// - Wire labels are `ADD`, `MODIFY` and `N/A`, matching `commits.action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CommitAction {
    /// First commit of a service within a target.
    #[serde(rename = "ADD")]
    Add,
    /// Later commit of an already added service.
    #[serde(rename = "MODIFY")]
    Modify,
    /// Commit of a project that is not service-scoped.
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl CommitAction {
    /// Returns the stored `commits.action` label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Modify => "MODIFY",
            Self::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for CommitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Legacy Records
// ============================================================================

/// Legacy `projects` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    /// Project identifier.
    pub id: ProjectId,
    /// Structural kind.
    pub kind: ProjectKind,
}

/// Legacy `targets` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRecord {
    /// Target identifier.
    pub id: TargetId,
    /// Owning project.
    pub project_id: ProjectId,
}

/// Legacy `commits` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Commit identifier.
    pub id: CommitId,
    /// Owning target.
    pub target_id: TargetId,
    /// Position within the target's history, ordered by `created_at` and
    /// then insertion order as the store compares them.
    pub sequence: u64,
    /// Service name (legacy `service`).
    pub service: Option<String>,
}

/// Legacy `versions` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    /// Version identifier.
    pub id: VersionId,
    /// Commit that produced this version.
    pub commit_id: CommitId,
    /// Legacy validity flag.
    pub valid: bool,
}

/// Legacy `version_commit` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingRecord {
    /// Composed version.
    pub version_id: VersionId,
    /// Commit contributing to the composition.
    pub commit_id: CommitId,
    /// URL recorded for the contribution.
    pub url: Option<String>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
