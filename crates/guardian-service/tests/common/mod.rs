// crates/guardian-service/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fixtures for guardian service integration tests.
// Purpose: Build configured servers and sealed requests deterministically.
// Dependencies: guardian-config, guardian-core, guardian-service
// ============================================================================

//! ## Overview
//! Helpers that build a [`GuardianServer`] from TOML with a seeded in-memory
//! key and seal operation messages the way a real caller would.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use guardian_config::GuardianConfig;
use guardian_core::AeadSecretChannel;
use guardian_core::CapabilityKey;
use guardian_service::GuardianServer;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Identity seeded into every test server.
pub const IDENTITY: &str = "cap-1";
/// Base64 of bytes 0..32, the key seeded for [`IDENTITY`].
pub const SAMPLE_KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";

/// Returns a config for `module` with audit disabled and one seeded key.
pub fn config_for(module: &str, extra: &str) -> GuardianConfig {
    let toml = format!(
        r#"[guardian_service]
operations = "{module}"
{extra}

[server]
bind = "127.0.0.1:0"
max_body_bytes = 4096

[server.audit]
enabled = false

[capability_store]
type = "memory"

[[capability_store.keys]]
identity = "{IDENTITY}"
key = "{SAMPLE_KEY}"

[[endpoints]]
endpoint_id = "ledger"
url = "https://ledger.example.com"
"#
    );
    GuardianConfig::from_toml_str(&toml).expect("test config")
}

/// Builds a server for `module`.
pub fn server_for(module: &str) -> GuardianServer {
    GuardianServer::from_config(config_for(module, "")).expect("server")
}

/// Returns the seeded capability key.
pub fn sample_key() -> CapabilityKey {
    CapabilityKey::from_base64(SAMPLE_KEY).expect("sample key")
}

/// Seals `operation` for `identity` under `key` and returns the request body.
pub fn sealed_body(identity: &str, key: &CapabilityKey, operation: &Value) -> Vec<u8> {
    let envelope = AeadSecretChannel.seal(key, operation).expect("seal");
    serde_json::to_vec(&json!({
        "minted_identity": identity,
        "operation": envelope,
    }))
    .expect("request body")
}

/// Seals a call to `method` with `parameters` for the seeded identity.
pub fn invocation(method: &str, parameters: &Value) -> Vec<u8> {
    sealed_body(
        IDENTITY,
        &sample_key(),
        &json!({
            "nonce": "n-1",
            "method_name": method,
            "parameters": parameters,
        }),
    )
}
