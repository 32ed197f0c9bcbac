// crates/guardian-core/src/interfaces.rs
// ============================================================================
// Module: Guardian Interfaces
// Description: Collaborator contracts consumed by the capability dispatcher.
// Purpose: Define narrow seams for key storage, decryption, and operations.
// Dependencies: crate::{capability, envelope}, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The dispatcher never reaches into concrete storage or crypto. It consumes
//! three interfaces: a [`CapabilityStore`] resolving keys, a [`SecretChannel`]
//! opening envelopes, and [`OperationHandler`] implementations registered
//! under method names. All implementations are shared across concurrent
//! requests and must be `Send + Sync`.
//!
//! Security posture: every implementation consumes untrusted input and must
//! fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::capability::CapabilityKey;
use crate::capability::MintedIdentity;
use crate::envelope::SecretEnvelope;

// ============================================================================
// SECTION: Capability Store
// ============================================================================

/// Capability store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapabilityStoreError {
    /// Identity has no key in the store.
    #[error("capability not found: {0}")]
    NotFound(String),
    /// Identity already has a key.
    #[error("capability already exists: {0}")]
    AlreadyExists(String),
    /// Backend failure.
    #[error("capability store error: {0}")]
    Store(String),
}

/// Resolves minted identities to capability keys.
pub trait CapabilityStore: Send + Sync {
    /// Returns the key bound to the identity.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityStoreError`] when the identity is unknown or the
    /// backend fails.
    fn capability_key(&self, identity: &MintedIdentity)
    -> Result<CapabilityKey, CapabilityStoreError>;
}

// ============================================================================
// SECTION: Secret Channel
// ============================================================================

/// Secret channel errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretChannelError {
    /// Envelope field was not valid base64 or had the wrong length.
    #[error("secret channel encoding error: {0}")]
    Encoding(String),
    /// Authenticated decryption failed.
    #[error("secret channel decryption failed: {0}")]
    Decrypt(String),
    /// Encryption failed.
    #[error("secret channel encryption failed")]
    Encrypt,
    /// Plaintext was not a JSON document.
    #[error("secret channel payload is not json: {0}")]
    Payload(String),
}

/// Opens encrypted envelopes using a capability key.
pub trait SecretChannel: Send + Sync {
    /// Decrypts the envelope and parses the plaintext as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SecretChannelError`] on any decoding, authentication, or
    /// parsing failure.
    fn open(
        &self,
        key: &CapabilityKey,
        envelope: &SecretEnvelope,
    ) -> Result<Value, SecretChannelError>;
}

// ============================================================================
// SECTION: Operation Handler
// ============================================================================

/// Operation handler errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// Parameters were rejected by the handler.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    /// Handler failed while executing.
    #[error("operation error: {0}")]
    Failed(String),
    /// Handler could not be constructed.
    #[error("handler initialization failed: {0}")]
    Init(String),
}

/// Business logic registered under a method name.
///
/// # Invariants
/// - Handlers are constructed once and reused across concurrent requests.
/// - Any internal mutable state is synchronized by the handler itself.
pub trait OperationHandler: Send + Sync {
    /// Invokes the operation with the request parameters.
    ///
    /// Returning `Ok(None)` reports an empty result, which the dispatcher
    /// treats as an operation failure.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the operation cannot complete.
    fn invoke(&self, parameters: &Map<String, Value>) -> Result<Option<Value>, HandlerError>;
}
