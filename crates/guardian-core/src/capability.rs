// crates/guardian-core/src/capability.rs
// ============================================================================
// Module: Capability Identifiers and Keys
// Description: Minted identity identifiers and capability key material.
// Purpose: Provide strongly typed capability handles with redacted key output.
// Dependencies: base64, rand, serde, sha2
// ============================================================================

//! ## Overview
//! A capability is a minted identity paired with a symmetric key. Possession
//! of the key is the only proof of the right to invoke operations, so key
//! material never appears in `Debug` output and is only exposed as bytes or
//! base64 on explicit request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Capability key length in bytes.
pub const CAPABILITY_KEY_BYTES: usize = 32;

// ============================================================================
// SECTION: Minted Identity
// ============================================================================

/// Identifier naming a capability grant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MintedIdentity(String);

impl MintedIdentity {
    /// Creates a new minted identity.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a hex SHA-256 fingerprint suitable for audit logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

impl fmt::Display for MintedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for MintedIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MintedIdentity {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Capability Key
// ============================================================================

/// Errors raised while decoding capability key material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapabilityKeyError {
    /// Key encoding was not valid base64.
    #[error("capability key is not valid base64")]
    Encoding,
    /// Key had the wrong length.
    #[error("capability key must be {expected} bytes, got {actual}")]
    Length {
        /// Required key length.
        expected: usize,
        /// Provided key length.
        actual: usize,
    },
}

/// Symmetric key bound to a minted identity.
///
/// # Invariants
/// - Always exactly [`CAPABILITY_KEY_BYTES`] long.
/// - `Debug` never prints key material.
#[derive(Clone, PartialEq, Eq)]
pub struct CapabilityKey([u8; CAPABILITY_KEY_BYTES]);

impl CapabilityKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; CAPABILITY_KEY_BYTES]) -> Self {
        Self(bytes)
    }

    /// Builds a key from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityKeyError::Length`] when the slice is not exactly
    /// [`CAPABILITY_KEY_BYTES`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CapabilityKeyError> {
        let array: [u8; CAPABILITY_KEY_BYTES] =
            bytes.try_into().map_err(|_| CapabilityKeyError::Length {
                expected: CAPABILITY_KEY_BYTES,
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }

    /// Decodes a base64-encoded key.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityKeyError`] when decoding fails or the length is wrong.
    pub fn from_base64(encoded: &str) -> Result<Self, CapabilityKeyError> {
        let bytes = STANDARD.decode(encoded.trim()).map_err(|_| CapabilityKeyError::Encoding)?;
        Self::from_slice(&bytes)
    }

    /// Generates a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; CAPABILITY_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; CAPABILITY_KEY_BYTES] {
        &self.0
    }

    /// Returns the key encoded as base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl fmt::Debug for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CapabilityKey(<redacted>)")
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
