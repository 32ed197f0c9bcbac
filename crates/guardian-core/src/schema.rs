// crates/guardian-core/src/schema.rs
// ============================================================================
// Module: Capability Schemas
// Description: JSON schemas for capability requests and operation messages.
// Purpose: Type-check untrusted documents before fields are extracted.
// Dependencies: jsonschema, serde_json
// ============================================================================

//! ## Overview
//! The request and operation schemas constrain field types only. Presence is
//! checked afterwards by the extractors in [`crate::envelope`], so that an
//! absent field is reported by name while a mistyped one is reported as
//! generic invalid JSON.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jsonschema::Draft;
use jsonschema::ValidationError;
use jsonschema::Validator;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Schemas
// ============================================================================

/// Returns the schema for inbound capability requests.
#[must_use]
pub fn capability_request_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "minted_identity": { "type": "string" },
            "operation": {
                "type": "object",
                "properties": {
                    "encrypted_session_key": { "type": "string" },
                    "session_key_iv": { "type": "string" },
                    "encrypted_message": { "type": "string" }
                }
            }
        }
    })
}

/// Returns the schema for decrypted operation messages.
#[must_use]
pub fn operation_message_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "nonce": { "type": "string" },
            "method_name": { "type": "string" },
            "parameters": { "type": "object" }
        }
    })
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema compilation errors.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Schema failed to compile.
    #[error("invalid schema: {0}")]
    Compile(String),
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Compiled validators for the capability wire formats.
///
/// # Invariants
/// - Compiled once and shared read-only across requests.
pub struct CapabilitySchemas {
    /// Compiled request schema.
    request: Validator,
    /// Compiled operation schema.
    operation: Validator,
}

impl CapabilitySchemas {
    /// Compiles the request and operation schemas.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when a schema fails to compile.
    pub fn compile() -> Result<Self, SchemaError> {
        Ok(Self {
            request: compile_schema(&capability_request_schema())?,
            operation: compile_schema(&operation_message_schema())?,
        })
    }

    /// Returns true when the document satisfies the request schema.
    #[must_use]
    pub fn validate_request(&self, document: &Value) -> bool {
        self.request.is_valid(document)
    }

    /// Returns true when the document satisfies the operation schema.
    #[must_use]
    pub fn validate_operation(&self, document: &Value) -> bool {
        self.operation.is_valid(document)
    }

    /// Returns the first operation schema violation, for server-side logs.
    #[must_use]
    pub fn operation_violation(&self, document: &Value) -> Option<String> {
        self.operation.iter_errors(document).next().map(|error| describe_violation(&error))
    }

    /// Returns the first request schema violation, for server-side logs.
    ///
    /// Only schema and instance locations are reported. Offending values can
    /// carry caller identities and are never echoed.
    #[must_use]
    pub fn request_violation(&self, document: &Value) -> Option<String> {
        self.request.iter_errors(document).next().map(|error| describe_violation(&error))
    }
}

/// Formats a validation error by location only.
fn describe_violation(error: &ValidationError<'_>) -> String {
    let instance = error.instance_path().as_str();
    let instance = if instance.is_empty() { "/" } else { instance };
    format!("{} failed at {instance}", error.schema_path())
}

/// Compiles a JSON schema for validation.
fn compile_schema(schema: &Value) -> Result<Validator, SchemaError> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| SchemaError::Compile(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
