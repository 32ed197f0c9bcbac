// crates/guardian-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for guardian-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use guardian_config::ConfigError;
use guardian_config::GuardianConfig;

/// Base64 of bytes 0..32, a valid capability key.
pub const SAMPLE_KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";

/// Parses a TOML string into a `GuardianConfig` without validation.
pub fn config_from_toml(toml_str: &str) -> Result<GuardianConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal valid config naming the basic operations module.
pub fn minimal_config() -> Result<GuardianConfig, toml::de::Error> {
    config_from_toml("[guardian_service]\noperations = \"guardian.operations.basic\"\n")
}

/// Asserts that validation failed with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
