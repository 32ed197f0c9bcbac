// crates/guardian-core/src/secrets.rs
// ============================================================================
// Module: Secret Channel Codec
// Description: Two-layer AEAD envelope for capability operation payloads.
// Purpose: Seal and open operation messages under a capability key.
// Dependencies: base64, chacha20poly1305, rand, serde_json
// ============================================================================

//! ## Overview
//! The envelope has two layers. A fresh 32-byte session key is sealed under
//! the capability key with ChaCha20-Poly1305, the 12-byte nonce prepended to
//! the ciphertext. The operation message is sealed under the session key with
//! the IV carried separately in `session_key_iv`. All three fields travel as
//! standard base64.
//!
//! Security posture: every decoding and authentication failure collapses to a
//! [`SecretChannelError`]; callers must not distinguish them to clients.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::ChaCha20Poly1305;
use chacha20poly1305::Nonce;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::aead::KeyInit;
use rand::RngCore;
use serde_json::Value;

use crate::capability::CAPABILITY_KEY_BYTES;
use crate::capability::CapabilityKey;
use crate::envelope::SecretEnvelope;
use crate::interfaces::SecretChannel;
use crate::interfaces::SecretChannelError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// AEAD nonce length in bytes.
pub const NONCE_BYTES: usize = 12;
/// Session key length in bytes.
pub const SESSION_KEY_BYTES: usize = 32;

// ============================================================================
// SECTION: Channel
// ============================================================================

/// ChaCha20-Poly1305 secret channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct AeadSecretChannel;

impl AeadSecretChannel {
    /// Seals a JSON payload for the holder of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SecretChannelError`] when serialization or encryption fails.
    pub fn seal(
        &self,
        key: &CapabilityKey,
        payload: &Value,
    ) -> Result<SecretEnvelope, SecretChannelError> {
        let plaintext = serde_json::to_vec(payload)
            .map_err(|err| SecretChannelError::Payload(err.to_string()))?;

        let mut session_key = [0u8; SESSION_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut session_key);
        let mut wrap_nonce = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut wrap_nonce);
        let mut iv = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut iv);

        let wrapped = cipher_for(key.as_bytes())?
            .encrypt(Nonce::from_slice(&wrap_nonce), session_key.as_slice())
            .map_err(|_| SecretChannelError::Encrypt)?;
        let mut encrypted_session_key = Vec::with_capacity(NONCE_BYTES + wrapped.len());
        encrypted_session_key.extend_from_slice(&wrap_nonce);
        encrypted_session_key.extend_from_slice(&wrapped);

        let encrypted_message = cipher_for(&session_key)?
            .encrypt(Nonce::from_slice(&iv), plaintext.as_slice())
            .map_err(|_| SecretChannelError::Encrypt)?;

        Ok(SecretEnvelope {
            encrypted_session_key: STANDARD.encode(encrypted_session_key),
            session_key_iv: STANDARD.encode(iv),
            encrypted_message: STANDARD.encode(encrypted_message),
        })
    }
}

impl SecretChannel for AeadSecretChannel {
    fn open(
        &self,
        key: &CapabilityKey,
        envelope: &SecretEnvelope,
    ) -> Result<Value, SecretChannelError> {
        let wrapped = decode_field("encrypted_session_key", &envelope.encrypted_session_key)?;
        if wrapped.len() <= NONCE_BYTES {
            return Err(SecretChannelError::Encoding(
                "encrypted_session_key too short".to_string(),
            ));
        }
        let (wrap_nonce, wrapped_key) = wrapped.split_at(NONCE_BYTES);
        let session_key = cipher_for(key.as_bytes())?
            .decrypt(Nonce::from_slice(wrap_nonce), wrapped_key)
            .map_err(|_| SecretChannelError::Decrypt("session key".to_string()))?;
        if session_key.len() != SESSION_KEY_BYTES {
            return Err(SecretChannelError::Decrypt("session key length".to_string()));
        }

        let iv = decode_field("session_key_iv", &envelope.session_key_iv)?;
        if iv.len() != NONCE_BYTES {
            return Err(SecretChannelError::Encoding("session_key_iv length".to_string()));
        }
        let ciphertext = decode_field("encrypted_message", &envelope.encrypted_message)?;
        let plaintext = cipher_for(&session_key)?
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
            .map_err(|_| SecretChannelError::Decrypt("message".to_string()))?;

        serde_json::from_slice(&plaintext).map_err(|err| SecretChannelError::Payload(err.to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds an AEAD cipher from raw key bytes.
fn cipher_for(key: &[u8]) -> Result<ChaCha20Poly1305, SecretChannelError> {
    if key.len() != CAPABILITY_KEY_BYTES {
        return Err(SecretChannelError::Encoding("key length".to_string()));
    }
    ChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| SecretChannelError::Encoding("key length".to_string()))
}

/// Decodes a base64 envelope field.
fn decode_field(field: &str, value: &str) -> Result<Vec<u8>, SecretChannelError> {
    STANDARD.decode(value).map_err(|_| SecretChannelError::Encoding(format!("{field} not base64")))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
