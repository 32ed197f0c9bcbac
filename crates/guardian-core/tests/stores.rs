//! In-memory capability store and endpoint registry tests for guardian-core.
// crates/guardian-core/tests/stores.rs
// =============================================================================
// Module: Store and Registry Tests
// Description: Validate key lookup, minting, revocation, and endpoint rules.
// Purpose: Ensure stores fail closed on unknown identities and duplicates.
// =============================================================================

#![allow(
    clippy::use_debug,
    clippy::missing_docs_in_private_items,
    reason = "Test-only diagnostics and helpers are permitted."
)]

use std::sync::Arc;
use std::thread;

use guardian_core::CapabilityKey;
use guardian_core::CapabilityStore;
use guardian_core::CapabilityStoreError;
use guardian_core::EndpointError;
use guardian_core::EndpointRecord;
use guardian_core::EndpointRegistry;
use guardian_core::InMemoryCapabilityStore;
use guardian_core::MintedIdentity;

type TestResult = Result<(), String>;

#[test]
fn unknown_identity_is_not_found() -> TestResult {
    let store = InMemoryCapabilityStore::new();
    match store.capability_key(&MintedIdentity::new("cap-missing")) {
        Err(CapabilityStoreError::NotFound(identity)) if identity == "cap-missing" => Ok(()),
        other => Err(format!("unexpected lookup result: {:?}", other.map(|_| ()))),
    }
}

#[test]
fn minted_key_resolves() -> TestResult {
    let store = InMemoryCapabilityStore::new();
    let key = store.mint(MintedIdentity::new("cap-1")).map_err(|err| err.to_string())?;
    let resolved =
        store.capability_key(&MintedIdentity::new("cap-1")).map_err(|err| err.to_string())?;
    if resolved != key {
        return Err("resolved key differs from minted key".to_string());
    }
    Ok(())
}

#[test]
fn duplicate_identity_is_rejected() -> TestResult {
    let store = InMemoryCapabilityStore::new();
    store
        .insert(MintedIdentity::new("cap-1"), CapabilityKey::generate())
        .map_err(|err| err.to_string())?;
    match store.insert(MintedIdentity::new("cap-1"), CapabilityKey::generate()) {
        Err(CapabilityStoreError::AlreadyExists(_)) => Ok(()),
        other => Err(format!("expected duplicate rejection, got {other:?}")),
    }
}

#[test]
fn revoked_identity_no_longer_resolves() -> TestResult {
    let store = InMemoryCapabilityStore::new();
    store.mint(MintedIdentity::new("cap-1")).map_err(|err| err.to_string())?;
    let removed = store.revoke(&MintedIdentity::new("cap-1")).map_err(|err| err.to_string())?;
    if !removed {
        return Err("revoke should report removal".to_string());
    }
    if store.capability_key(&MintedIdentity::new("cap-1")).is_ok() {
        return Err("revoked key still resolves".to_string());
    }
    let identities = store.identities().map_err(|err| err.to_string())?;
    if !identities.is_empty() {
        return Err("identities should be empty".to_string());
    }
    Ok(())
}

#[test]
fn concurrent_lookups_share_the_store() -> TestResult {
    let store = Arc::new(InMemoryCapabilityStore::new());
    let key = store.mint(MintedIdentity::new("cap-shared")).map_err(|err| err.to_string())?;
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.capability_key(&MintedIdentity::new("cap-shared")))
        })
        .collect();
    for handle in handles {
        let resolved = handle
            .join()
            .map_err(|_| "lookup thread panicked".to_string())?
            .map_err(|err| err.to_string())?;
        if resolved != key {
            return Err("concurrent lookup returned wrong key".to_string());
        }
    }
    Ok(())
}

#[test]
fn endpoint_registry_rejects_duplicates() -> TestResult {
    let records = vec![
        EndpointRecord {
            endpoint_id: "ledger".to_string(),
            url: "http://127.0.0.1:7000".to_string(),
        },
        EndpointRecord {
            endpoint_id: "ledger".to_string(),
            url: "http://127.0.0.1:7001".to_string(),
        },
    ];
    match EndpointRegistry::from_records(records) {
        Err(EndpointError::Duplicate(id)) if id == "ledger" => Ok(()),
        other => Err(format!("expected duplicate error, got {:?}", other.map(|r| r.len()))),
    }
}

#[test]
fn endpoint_registry_lists_sorted_records() -> TestResult {
    let registry = EndpointRegistry::from_records(vec![
        EndpointRecord {
            endpoint_id: "storage".to_string(),
            url: "https://storage.example.com".to_string(),
        },
        EndpointRecord {
            endpoint_id: "ledger".to_string(),
            url: "https://ledger.example.com".to_string(),
        },
    ])
    .map_err(|err| err.to_string())?;
    let ids: Vec<String> = registry.records().into_iter().map(|r| r.endpoint_id).collect();
    if ids != ["ledger", "storage"] {
        return Err(format!("unexpected order: {ids:?}"));
    }
    if registry.get("ledger").map(|r| r.url.as_str()) != Some("https://ledger.example.com") {
        return Err("lookup failed".to_string());
    }
    Ok(())
}
