//! Server and service config validation tests for guardian-config.
// crates/guardian-config/tests/server_validation.rs
// =============================================================================
// Module: Server Config Validation Tests
// Description: Validate dispatcher module, bind, and body limit constraints.
// Purpose: Ensure the guardian refuses to start with unsafe server settings.
// =============================================================================

use guardian_config::MAX_BODY_BYTES_LIMIT;

mod common;

type TestResult = Result<(), String>;

#[test]
fn minimal_config_is_valid() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.operations_module() != Some("guardian.operations.basic") {
        return Err("operations module not parsed".to_string());
    }
    Ok(())
}

#[test]
fn missing_operations_module_is_rejected() -> TestResult {
    let config = common::config_from_toml("").map_err(|err| err.to_string())?;
    common::assert_invalid(config.validate(), "guardian_service.operations must be set")
}

#[test]
fn blank_operations_module_is_rejected() -> TestResult {
    let config = common::config_from_toml("[guardian_service]\noperations = \"   \"\n")
        .map_err(|err| err.to_string())?;
    common::assert_invalid(config.validate(), "guardian_service.operations must be non-empty")
}

#[test]
fn legacy_section_spelling_is_accepted() -> TestResult {
    let config =
        common::config_from_toml("[GuardianService]\nOperations = \"guardian.operations.counter\"\n")
            .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.operations_module() != Some("guardian.operations.counter") {
        return Err("legacy spelling not honored".to_string());
    }
    Ok(())
}

#[test]
fn handler_settings_are_carried() -> TestResult {
    let config = common::config_from_toml(
        "[guardian_service]\noperations = \"guardian.operations.counter\"\n\n[guardian_service.settings]\ncounter_limit = 41\n",
    )
    .map_err(|err| err.to_string())?;
    match config.guardian_service.settings.get("counter_limit").and_then(serde_json::Value::as_i64) {
        Some(41) => Ok(()),
        other => Err(format!("unexpected setting: {other:?}")),
    }
}

#[test]
fn zero_body_limit_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.max_body_bytes = 0;
    common::assert_invalid(config.validate(), "max_body_bytes must be greater than zero")
}

#[test]
fn oversized_body_limit_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.max_body_bytes = MAX_BODY_BYTES_LIMIT + 1;
    common::assert_invalid(config.validate(), "max_body_bytes must be at most")
}

#[test]
fn invalid_bind_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.bind = "localhost-ish".to_string();
    common::assert_invalid(config.validate(), "invalid bind address")
}

#[test]
fn non_loopback_bind_requires_opt_in() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.bind = "0.0.0.0:8080".to_string();
    common::assert_invalid(config.validate(), "non-loopback bind requires")?;
    config.server.allow_non_loopback = true;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn empty_audit_path_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.audit.path = Some("  ".to_string());
    common::assert_invalid(config.validate(), "audit.path must be non-empty")
}
