// crates/guardian-core/src/error.rs
// ============================================================================
// Module: Dispatch Error Taxonomy
// Description: Client-facing error classes for capability dispatch.
// Purpose: Separate structural errors from opaque failures at the trust boundary.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Dispatch failures fall into two classes. Structural failures (malformed
//! JSON, missing fields, unknown operation names) reveal nothing about secret
//! material and are reported to the caller verbatim. Opaque failures (store
//! lookup, decryption, handler internals) carry a server-side detail string
//! that is logged but never serialized; callers only see a fixed message.
//!
//! Security posture: an unknown identity and a corrupted ciphertext must be
//! indistinguishable to the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Public Messages
// ============================================================================

/// Message for malformed or schema-invalid JSON.
pub const MSG_INVALID_JSON: &str = "invalid JSON";
/// Message for capability resolution and decryption failures.
pub const MSG_UNPACK_FAILED: &str = "unknown exception while unpacking request";
/// Message for handler errors and panics.
pub const MSG_OPERATION_EXCEPTION: &str = "unknown exception while performing operation";
/// Message for handlers that returned an empty result.
pub const MSG_OPERATION_FAILED: &str = "operation failed";

// ============================================================================
// SECTION: Error Class
// ============================================================================

/// Disclosure class of a dispatch error.
///
/// # Invariants
/// - Only the `Structural` message and the `Opaque` public message leave the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// Error safe to report in full.
    Structural(String),
    /// Error reported with a fixed message; detail stays in server logs.
    Opaque {
        /// Fixed client-facing message.
        public: &'static str,
        /// Server-side diagnostic detail.
        detail: String,
    },
}

// ============================================================================
// SECTION: Dispatch Error
// ============================================================================

/// Capability dispatch errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `Display` never includes opaque detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Body was not JSON or failed a schema check.
    #[error("invalid JSON")]
    InvalidJson,
    /// Outer request lacked a required field.
    #[error("missing field in request: {0}")]
    MissingRequestField(String),
    /// Decrypted operation lacked a required field.
    #[error("missing field: {0}")]
    MissingOperationField(String),
    /// Method name is not in the handler table.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    /// Capability lookup or decryption failed.
    #[error("unknown exception while unpacking request")]
    Unpack(String),
    /// Handler raised an error or panicked.
    #[error("unknown exception while performing operation")]
    OperationException(String),
    /// Handler returned an empty result.
    #[error("operation failed")]
    OperationFailed,
}

impl DispatchError {
    /// Returns the disclosure class for the error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Unpack(detail) => ErrorClass::Opaque {
                public: MSG_UNPACK_FAILED,
                detail: detail.clone(),
            },
            Self::OperationException(detail) => ErrorClass::Opaque {
                public: MSG_OPERATION_EXCEPTION,
                detail: detail.clone(),
            },
            other => ErrorClass::Structural(other.to_string()),
        }
    }

    /// Returns the message safe to send to the caller.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.class() {
            ErrorClass::Structural(message) => message,
            ErrorClass::Opaque {
                public, ..
            } => public.to_string(),
        }
    }

    /// Returns server-side detail for opaque errors.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Unpack(detail) | Self::OperationException(detail) => Some(detail),
            _ => None,
        }
    }

    /// Returns a stable label for audit records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidJson => "invalid_json",
            Self::MissingRequestField(_) => "missing_request_field",
            Self::MissingOperationField(_) => "missing_operation_field",
            Self::UnknownOperation(_) => "unknown_operation",
            Self::Unpack(_) => "unpack_failed",
            Self::OperationException(_) => "operation_exception",
            Self::OperationFailed => "operation_failed",
        }
    }
}
