// crates/guardian-core/src/endpoints.rs
// ============================================================================
// Module: Endpoint Registry
// Description: Registry of contract service endpoints known to the guardian.
// Purpose: Share endpoint lookups with the dispatcher and service surfaces.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The endpoint registry maps endpoint identifiers to service URLs. It is
//! built once at startup and shared read-only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Registered endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    /// Endpoint identifier.
    pub endpoint_id: String,
    /// Service URL.
    pub url: String,
}

/// Endpoint registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    /// Endpoint identifier is already registered.
    #[error("endpoint already registered: {0}")]
    Duplicate(String),
}

/// Endpoint registry keyed by endpoint identifier.
///
/// # Invariants
/// - Endpoint identifiers are unique.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    /// Endpoints keyed by identifier.
    endpoints: BTreeMap<String, EndpointRecord>,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from records, rejecting duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Duplicate`] when an identifier repeats.
    pub fn from_records(
        records: impl IntoIterator<Item = EndpointRecord>,
    ) -> Result<Self, EndpointError> {
        let mut registry = Self::new();
        for record in records {
            registry.register(record)?;
        }
        Ok(registry)
    }

    /// Registers an endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Duplicate`] when the identifier is taken.
    pub fn register(&mut self, record: EndpointRecord) -> Result<(), EndpointError> {
        if self.endpoints.contains_key(&record.endpoint_id) {
            return Err(EndpointError::Duplicate(record.endpoint_id));
        }
        self.endpoints.insert(record.endpoint_id.clone(), record);
        Ok(())
    }

    /// Looks up an endpoint by identifier.
    #[must_use]
    pub fn get(&self, endpoint_id: &str) -> Option<&EndpointRecord> {
        self.endpoints.get(endpoint_id)
    }

    /// Returns endpoints sorted by identifier.
    #[must_use]
    pub fn records(&self) -> Vec<EndpointRecord> {
        self.endpoints.values().cloned().collect()
    }

    /// Returns the number of registered endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns true when no endpoints are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
