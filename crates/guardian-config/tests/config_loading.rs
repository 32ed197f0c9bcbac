//! Config file loading tests for guardian-config.
// crates/guardian-config/tests/config_loading.rs
// =============================================================================
// Module: Config Loading Tests
// Description: Validate file reads, size and encoding limits, and examples.
// Purpose: Ensure config loading fails closed on untrusted files.
// =============================================================================

use std::fs;

use guardian_config::ConfigError;
use guardian_config::GuardianConfig;
use guardian_config::config_toml_example;
use tempfile::TempDir;

type TestResult = Result<(), String>;

#[test]
fn example_config_loads_from_disk() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("guardian.toml");
    fs::write(&path, config_toml_example()).map_err(|err| err.to_string())?;
    let config = GuardianConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.operations_module() != Some("guardian.operations.basic") {
        return Err("example operations module mismatch".to_string());
    }
    if config.capability_store.keys.len() != 1 || config.endpoints.len() != 1 {
        return Err("example sections not parsed".to_string());
    }
    Ok(())
}

#[test]
fn missing_file_is_io_error() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    match GuardianConfig::load(Some(&dir.path().join("absent.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got {:?}", other.map(|_| ()))),
    }
}

#[test]
fn malformed_toml_is_parse_error() -> TestResult {
    match GuardianConfig::from_toml_str("[guardian_service\noperations = ") {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got {:?}", other.map(|_| ()))),
    }
}

#[test]
fn oversized_file_is_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("guardian.toml");
    let mut content = config_toml_example();
    content.push('#');
    content.push_str(&"x".repeat(1024 * 1024));
    fs::write(&path, content).map_err(|err| err.to_string())?;
    match GuardianConfig::load(Some(&path)) {
        Err(ConfigError::Invalid(message)) if message.contains("size limit") => Ok(()),
        other => Err(format!("expected size error, got {:?}", other.map(|_| ()))),
    }
}

#[test]
fn non_utf8_file_is_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("guardian.toml");
    fs::write(&path, [0xff, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    match GuardianConfig::load(Some(&path)) {
        Err(ConfigError::Invalid(message)) if message.contains("utf-8") => Ok(()),
        other => Err(format!("expected utf-8 error, got {:?}", other.map(|_| ()))),
    }
}

#[test]
fn loading_runs_validation() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("guardian.toml");
    fs::write(&path, "[server]\nbind = \"127.0.0.1:9000\"\n").map_err(|err| err.to_string())?;
    match GuardianConfig::load(Some(&path)) {
        Err(ConfigError::Invalid(message)) if message.contains("operations") => Ok(()),
        other => Err(format!("expected validation error, got {:?}", other.map(|_| ()))),
    }
}
