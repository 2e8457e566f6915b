// crates/registry-migrate-config/src/lib.rs
// ============================================================================
// Module: Registry Migrate Config Library
// Description: Configuration model and validation for the migration tool.
// Purpose: Single source of truth for registry-migrate.toml semantics.
// Dependencies: registry-migrate-core, serde, toml
// ============================================================================

//! ## Overview
//! `registry-migrate-config` loads `registry-migrate.toml`, applies the
//! command-line store override and validates the result fail-closed before
//! any store is opened.
//!
//! Security posture: config inputs are untrusted and size-limited.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
