// crates/guardian-core/src/envelope.rs
// ============================================================================
// Module: Capability Wire Types
// Description: Inbound capability requests and decrypted operation messages.
// Purpose: Extract typed request fields from schema-checked JSON documents.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Requests arrive as loosely structured JSON. Schema checks establish field
//! types; the extractors in this module then pull out required fields and
//! report the first absent one by name. Extraction never touches key material.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::capability::MintedIdentity;
use crate::error::DispatchError;

// ============================================================================
// SECTION: Field Names
// ============================================================================

/// Request field naming the capability grant.
pub const FIELD_MINTED_IDENTITY: &str = "minted_identity";
/// Request field holding the encrypted operation envelope.
pub const FIELD_OPERATION: &str = "operation";
/// Envelope field holding the wrapped session key.
pub const FIELD_ENCRYPTED_SESSION_KEY: &str = "encrypted_session_key";
/// Envelope field holding the message IV.
pub const FIELD_SESSION_KEY_IV: &str = "session_key_iv";
/// Envelope field holding the encrypted operation message.
pub const FIELD_ENCRYPTED_MESSAGE: &str = "encrypted_message";
/// Operation field holding the caller nonce.
pub const FIELD_NONCE: &str = "nonce";
/// Operation field naming the requested method.
pub const FIELD_METHOD_NAME: &str = "method_name";
/// Operation field holding handler parameters.
pub const FIELD_PARAMETERS: &str = "parameters";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Encrypted envelope carrying an operation message.
///
/// # Invariants
/// - All fields are base64 strings; decoding happens in the secret channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretEnvelope {
    /// Session key wrapped under the capability key (nonce-prefixed).
    pub encrypted_session_key: String,
    /// IV used with the session key for the message.
    pub session_key_iv: String,
    /// Operation message encrypted under the session key.
    pub encrypted_message: String,
}

/// Wire-level capability invocation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRequest {
    /// Identity naming the capability grant.
    pub minted_identity: MintedIdentity,
    /// Encrypted operation envelope.
    pub operation: SecretEnvelope,
}

/// Plaintext operation recovered from a secret envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMessage {
    /// Caller-supplied nonce; carried through, not enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Requested method name.
    pub method_name: String,
    /// Handler-specific parameters.
    pub parameters: Map<String, Value>,
}

impl CapabilityRequest {
    /// Extracts a request from a document that passed the request schema.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MissingRequestField`] naming the first absent field,
    /// or [`DispatchError::InvalidJson`] when a field has the wrong type.
    pub fn from_document(document: &Value) -> Result<Self, DispatchError> {
        let object = document.as_object().ok_or(DispatchError::InvalidJson)?;
        let minted_identity = required_string(object, FIELD_MINTED_IDENTITY)
            .map_err(|missing| missing.in_request())?;
        let operation = object
            .get(FIELD_OPERATION)
            .ok_or_else(|| DispatchError::MissingRequestField(FIELD_OPERATION.to_string()))?
            .as_object()
            .ok_or(DispatchError::InvalidJson)?;
        let envelope = SecretEnvelope {
            encrypted_session_key: required_string(operation, FIELD_ENCRYPTED_SESSION_KEY)
                .map_err(|missing| missing.in_request())?,
            session_key_iv: required_string(operation, FIELD_SESSION_KEY_IV)
                .map_err(|missing| missing.in_request())?,
            encrypted_message: required_string(operation, FIELD_ENCRYPTED_MESSAGE)
                .map_err(|missing| missing.in_request())?,
        };
        Ok(Self {
            minted_identity: MintedIdentity::new(minted_identity),
            operation: envelope,
        })
    }
}

impl OperationMessage {
    /// Extracts an operation from a document that passed the operation schema.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MissingOperationField`] naming the first absent
    /// field, or [`DispatchError::InvalidJson`] when a field has the wrong type.
    pub fn from_document(document: &Value) -> Result<Self, DispatchError> {
        let object = document.as_object().ok_or(DispatchError::InvalidJson)?;
        let nonce = match object.get(FIELD_NONCE) {
            None => None,
            Some(value) => Some(value.as_str().ok_or(DispatchError::InvalidJson)?.to_string()),
        };
        let method_name =
            required_string(object, FIELD_METHOD_NAME).map_err(|missing| missing.in_operation())?;
        let parameters = object
            .get(FIELD_PARAMETERS)
            .ok_or_else(|| DispatchError::MissingOperationField(FIELD_PARAMETERS.to_string()))?
            .as_object()
            .ok_or(DispatchError::InvalidJson)?
            .clone();
        Ok(Self {
            nonce,
            method_name,
            parameters,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Failure to extract a required string field.
enum FieldFailure {
    /// Field absent.
    Missing(&'static str),
    /// Field present with the wrong type.
    WrongType,
}

impl FieldFailure {
    /// Maps the failure into a request-level dispatch error.
    fn in_request(self) -> DispatchError {
        match self {
            Self::Missing(field) => DispatchError::MissingRequestField(field.to_string()),
            Self::WrongType => DispatchError::InvalidJson,
        }
    }

    /// Maps the failure into an operation-level dispatch error.
    fn in_operation(self) -> DispatchError {
        match self {
            Self::Missing(field) => DispatchError::MissingOperationField(field.to_string()),
            Self::WrongType => DispatchError::InvalidJson,
        }
    }
}

/// Returns the string value of a required field.
fn required_string(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<String, FieldFailure> {
    let value = object.get(field).ok_or(FieldFailure::Missing(field))?;
    value.as_str().map(str::to_string).ok_or(FieldFailure::WrongType)
}
