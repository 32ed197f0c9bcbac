// crates/guardian-config/src/lib.rs
// ============================================================================
// Module: Guardian Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for guardian.toml semantics.
// Dependencies: guardian-core, guardian-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `guardian-config` defines the configuration model for the capability
//! guardian. It provides strict, fail-closed validation and a canonical
//! example file.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
