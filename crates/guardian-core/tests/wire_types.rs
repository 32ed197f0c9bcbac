//! Wire type extraction and error taxonomy tests for guardian-core.
// crates/guardian-core/tests/wire_types.rs
// =============================================================================
// Module: Wire Type Tests
// Description: Validate request/operation extraction and error disclosure.
// Purpose: Ensure absent fields are named and opaque detail never leaks.
// =============================================================================

#![allow(
    clippy::use_debug,
    clippy::missing_docs_in_private_items,
    reason = "Test-only diagnostics and helpers are permitted."
)]

use guardian_core::DispatchError;
use guardian_core::ErrorClass;
use guardian_core::envelope::CapabilityRequest;
use guardian_core::envelope::OperationMessage;
use guardian_core::error::MSG_OPERATION_EXCEPTION;
use guardian_core::error::MSG_UNPACK_FAILED;
use serde_json::json;

type TestResult = Result<(), String>;

fn expect_error<T>(result: Result<T, DispatchError>, expected: &DispatchError) -> TestResult {
    match result {
        Err(error) if &error == expected => Ok(()),
        Err(error) => Err(format!("unexpected error: {error}")),
        Ok(_) => Err("expected extraction to fail".to_string()),
    }
}

#[test]
fn request_extracts_all_fields() -> TestResult {
    let document = json!({
        "minted_identity": "cap-1",
        "operation": {
            "encrypted_session_key": "ABC",
            "session_key_iv": "DEF",
            "encrypted_message": "GHI"
        }
    });
    let request = CapabilityRequest::from_document(&document).map_err(|err| err.to_string())?;
    if request.minted_identity.as_str() != "cap-1" {
        return Err("minted identity mismatch".to_string());
    }
    if request.operation.encrypted_message != "GHI" {
        return Err("encrypted message mismatch".to_string());
    }
    Ok(())
}

#[test]
fn request_names_missing_identity() -> TestResult {
    let document = json!({
        "operation": {
            "encrypted_session_key": "ABC",
            "session_key_iv": "DEF",
            "encrypted_message": "GHI"
        }
    });
    expect_error(
        CapabilityRequest::from_document(&document),
        &DispatchError::MissingRequestField("minted_identity".to_string()),
    )
}

#[test]
fn request_names_missing_envelope_field() -> TestResult {
    let document = json!({
        "minted_identity": "cap-1",
        "operation": {
            "encrypted_session_key": "ABC",
            "encrypted_message": "GHI"
        }
    });
    expect_error(
        CapabilityRequest::from_document(&document),
        &DispatchError::MissingRequestField("session_key_iv".to_string()),
    )
}

#[test]
fn request_names_missing_operation() -> TestResult {
    let document = json!({ "minted_identity": "cap-1" });
    expect_error(
        CapabilityRequest::from_document(&document),
        &DispatchError::MissingRequestField("operation".to_string()),
    )
}

#[test]
fn operation_names_missing_method() -> TestResult {
    let document = json!({ "nonce": "n1", "parameters": {} });
    expect_error(
        OperationMessage::from_document(&document),
        &DispatchError::MissingOperationField("method_name".to_string()),
    )
}

#[test]
fn operation_names_missing_parameters() -> TestResult {
    let document = json!({ "nonce": "n1", "method_name": "get_status" });
    expect_error(
        OperationMessage::from_document(&document),
        &DispatchError::MissingOperationField("parameters".to_string()),
    )
}

#[test]
fn operation_nonce_is_optional() -> TestResult {
    let document = json!({ "method_name": "get_status", "parameters": { "a": 1 } });
    let message = OperationMessage::from_document(&document).map_err(|err| err.to_string())?;
    if message.nonce.is_some() {
        return Err("nonce should be absent".to_string());
    }
    if message.parameters.get("a") != Some(&json!(1)) {
        return Err("parameters not carried through".to_string());
    }
    Ok(())
}

#[test]
fn opaque_errors_hide_detail() -> TestResult {
    let unpack = DispatchError::Unpack("capability not found".to_string());
    if unpack.public_message() != MSG_UNPACK_FAILED {
        return Err(format!("unexpected public message: {}", unpack.public_message()));
    }
    if unpack.to_string().contains("capability not found") {
        return Err("display leaked opaque detail".to_string());
    }
    if unpack.detail() != Some("capability not found") {
        return Err("detail not retained for logs".to_string());
    }
    let handler = DispatchError::OperationException("disk full".to_string());
    match handler.class() {
        ErrorClass::Opaque {
            public, ..
        } if public == MSG_OPERATION_EXCEPTION => Ok(()),
        other => Err(format!("unexpected class: {other:?}")),
    }
}

#[test]
fn structural_errors_name_the_problem() -> TestResult {
    let error = DispatchError::UnknownOperation("launch".to_string());
    if error.public_message() != "unknown operation: launch" {
        return Err(format!("unexpected message: {}", error.public_message()));
    }
    if error.detail().is_some() {
        return Err("structural errors carry no detail".to_string());
    }
    if DispatchError::MissingOperationField("parameters".to_string()).public_message()
        != "missing field: parameters"
    {
        return Err("missing field message mismatch".to_string());
    }
    Ok(())
}
