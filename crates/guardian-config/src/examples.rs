// crates/guardian-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `guardian.toml`. The integration tests parse and
//! validate it, so it stays in sync with the config model.

/// Returns a canonical example `guardian.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[guardian_service]
operations = "guardian.operations.basic"

[server]
bind = "127.0.0.1:8080"
max_body_bytes = 1048576

[server.audit]
enabled = true
# path = "guardian-audit.jsonl"

[capability_store]
type = "memory"

[[capability_store.keys]]
identity = "cap-1"
key = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8="

[[endpoints]]
endpoint_id = "ledger"
url = "https://ledger.example.com"
"#,
    )
}
