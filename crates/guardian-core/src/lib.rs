// crates/guardian-core/src/lib.rs
// ============================================================================
// Module: Capability Guardian Core Library
// Description: Public API surface for the capability guardian core.
// Purpose: Expose wire types, key material, codecs, and collaborator interfaces.
// Dependencies: crate::{capability, endpoints, envelope, error, interfaces, schema, secrets, store}
// ============================================================================

//! ## Overview
//! Guardian core defines everything the capability dispatcher needs that is
//! independent of transport and storage: the request and operation wire
//! types, schema checks, the secret channel codec, capability keys, the
//! dispatch error taxonomy, and the interfaces for stores and handlers.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod capability;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod interfaces;
pub mod schema;
pub mod secrets;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use capability::CAPABILITY_KEY_BYTES;
pub use capability::CapabilityKey;
pub use capability::CapabilityKeyError;
pub use capability::MintedIdentity;
pub use endpoints::EndpointError;
pub use endpoints::EndpointRecord;
pub use endpoints::EndpointRegistry;
pub use envelope::CapabilityRequest;
pub use envelope::OperationMessage;
pub use envelope::SecretEnvelope;
pub use error::DispatchError;
pub use error::ErrorClass;
pub use interfaces::CapabilityStore;
pub use interfaces::CapabilityStoreError;
pub use interfaces::HandlerError;
pub use interfaces::OperationHandler;
pub use interfaces::SecretChannel;
pub use interfaces::SecretChannelError;
pub use schema::CapabilitySchemas;
pub use schema::SchemaError;
pub use secrets::AeadSecretChannel;
pub use store::InMemoryCapabilityStore;
