// crates/guardian-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for request building and argument parsing.
// Purpose: Ensure sealed requests decrypt server-side and bad input fails closed.
// Dependencies: guardian-cli main helpers, guardian-core
// ============================================================================

//! ## Overview
//! Validates that `build_request` produces envelopes the guardian can open,
//! and that parameter, identity, and key parsing reject malformed input.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use guardian_core::AeadSecretChannel;
use guardian_core::CapabilityKey;
use guardian_core::CapabilityRequest;
use guardian_core::MintedIdentity;
use guardian_core::SecretChannel;
use serde_json::json;

use super::OperationArgs;
use super::build_request;
use super::minted_key_document;
use super::parse_identity;
use super::parse_params;
use super::process_capability_url;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn args(key: &CapabilityKey, params: Option<&str>) -> OperationArgs {
    OperationArgs {
        key: key.to_base64(),
        identity: "cap-1".to_string(),
        method: "inc_value".to_string(),
        params: params.map(str::to_string),
        nonce: Some("n-7".to_string()),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn sealed_request_opens_with_the_same_key() {
    let key = CapabilityKey::generate();
    let document = build_request(&args(&key, Some(r#"{"by": 2}"#))).unwrap();
    let request = CapabilityRequest::from_document(&document).unwrap();
    assert_eq!(request.minted_identity, MintedIdentity::new("cap-1"));
    let plaintext = AeadSecretChannel.open(&key, &request.operation).unwrap();
    assert_eq!(
        plaintext,
        json!({"nonce": "n-7", "method_name": "inc_value", "parameters": {"by": 2}})
    );
}

#[test]
fn sealed_request_defaults_to_empty_parameters() {
    let key = CapabilityKey::generate();
    let mut operation = args(&key, None);
    operation.nonce = None;
    let document = build_request(&operation).unwrap();
    let request = CapabilityRequest::from_document(&document).unwrap();
    let plaintext = AeadSecretChannel.open(&key, &request.operation).unwrap();
    assert_eq!(plaintext, json!({"method_name": "inc_value", "parameters": {}}));
}

#[test]
fn bad_key_is_rejected() {
    let key = CapabilityKey::generate();
    let mut operation = args(&key, None);
    operation.key = "c2hvcnQ=".to_string();
    let error = build_request(&operation).unwrap_err();
    assert!(error.to_string().starts_with("invalid key"), "{error}");
}

#[test]
fn params_must_be_an_object() {
    assert!(parse_params(Some("[1, 2]")).unwrap_err().to_string().contains("JSON object"));
    assert!(parse_params(Some("{")).unwrap_err().to_string().contains("not valid JSON"));
    assert!(parse_params(None).unwrap().is_empty());
    let oversized = format!("{{\"a\":\"{}\"}}", "x".repeat(70 * 1024));
    assert!(parse_params(Some(&oversized)).unwrap_err().to_string().contains("exceeds"));
}

#[test]
fn identities_are_trimmed_and_non_empty() {
    assert_eq!(parse_identity("  cap-1 ").unwrap(), MintedIdentity::new("cap-1"));
    assert!(parse_identity("   ").is_err());
}

#[test]
fn capability_route_is_appended_once() {
    assert_eq!(
        process_capability_url("http://127.0.0.1:8080/"),
        "http://127.0.0.1:8080/process_capability"
    );
    assert_eq!(
        process_capability_url("http://127.0.0.1:8080/process_capability"),
        "http://127.0.0.1:8080/process_capability"
    );
}

#[test]
fn minted_key_document_round_trips_the_key() {
    let key = CapabilityKey::generate();
    let document = minted_key_document(&MintedIdentity::new("cap-9"), &key, false);
    assert_eq!(document["identity"], "cap-9");
    assert_eq!(document["persisted"], false);
    let decoded = CapabilityKey::from_base64(document["key"].as_str().unwrap()).unwrap();
    assert!(decoded == key);
}
