// crates/guardian-core/src/store.rs
// ============================================================================
// Module: In-Memory Capability Store
// Description: Process-local capability key storage.
// Purpose: Back the dispatcher in tests and memory-configured deployments.
// Dependencies: crate::{capability, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryCapabilityStore`] keeps keys in a `BTreeMap` behind an `RwLock`.
//! Reads take a shared lock, so concurrent lookups do not serialize.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::capability::CapabilityKey;
use crate::capability::MintedIdentity;
use crate::interfaces::CapabilityStore;
use crate::interfaces::CapabilityStoreError;

// ============================================================================
// SECTION: Store
// ============================================================================

/// In-memory capability store.
#[derive(Debug, Default)]
pub struct InMemoryCapabilityStore {
    /// Keys keyed by minted identity.
    keys: RwLock<BTreeMap<MintedIdentity, CapabilityKey>>,
}

impl InMemoryCapabilityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key for the identity.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityStoreError::AlreadyExists`] when the identity is taken.
    pub fn insert(
        &self,
        identity: MintedIdentity,
        key: CapabilityKey,
    ) -> Result<(), CapabilityStoreError> {
        let mut guard = self
            .keys
            .write()
            .map_err(|_| CapabilityStoreError::Store("lock poisoned".to_string()))?;
        if guard.contains_key(&identity) {
            return Err(CapabilityStoreError::AlreadyExists(identity.to_string()));
        }
        guard.insert(identity, key);
        Ok(())
    }

    /// Generates and stores a fresh key for the identity.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityStoreError::AlreadyExists`] when the identity is taken.
    pub fn mint(&self, identity: MintedIdentity) -> Result<CapabilityKey, CapabilityStoreError> {
        let key = CapabilityKey::generate();
        self.insert(identity, key.clone())?;
        Ok(key)
    }

    /// Removes the key for the identity, returning whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityStoreError::Store`] when the lock is poisoned.
    pub fn revoke(&self, identity: &MintedIdentity) -> Result<bool, CapabilityStoreError> {
        let mut guard = self
            .keys
            .write()
            .map_err(|_| CapabilityStoreError::Store("lock poisoned".to_string()))?;
        Ok(guard.remove(identity).is_some())
    }

    /// Returns the stored identities in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityStoreError::Store`] when the lock is poisoned.
    pub fn identities(&self) -> Result<Vec<MintedIdentity>, CapabilityStoreError> {
        let guard = self
            .keys
            .read()
            .map_err(|_| CapabilityStoreError::Store("lock poisoned".to_string()))?;
        Ok(guard.keys().cloned().collect())
    }
}

impl CapabilityStore for InMemoryCapabilityStore {
    fn capability_key(
        &self,
        identity: &MintedIdentity,
    ) -> Result<CapabilityKey, CapabilityStoreError> {
        let guard = self
            .keys
            .read()
            .map_err(|_| CapabilityStoreError::Store("lock poisoned".to_string()))?;
        guard
            .get(identity)
            .cloned()
            .ok_or_else(|| CapabilityStoreError::NotFound(identity.to_string()))
    }
}
