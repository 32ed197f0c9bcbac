// crates/guardian-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Capability Store
// Description: Durable CapabilityStore backend using SQLite.
// Purpose: Persist capability keys across guardian restarts.
// Dependencies: guardian-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`CapabilityStore`] that keeps one key
//! per minted identity. Keys are stored as raw 32-byte blobs and validated on
//! every read. Security posture: database contents are untrusted.
//!
//! [`CapabilityStore`]: guardian_core::CapabilityStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteCapabilityStore;
pub use store::SqliteCapabilityStoreError;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
