// crates/guardian-service/src/app.rs
// ============================================================================
// Module: Capability Invocation Dispatcher
// Description: Decrypt, validate, and dispatch capability operations.
// Purpose: Turn one raw request body into exactly one response.
// Dependencies: guardian-config, guardian-core, serde_json
// ============================================================================

//! ## Overview
//! [`ProcessCapabilityApp`] is built once per process. Construction resolves
//! the configured operations module and instantiates every handler; any
//! failure there stops startup. Each request then runs a fixed pipeline:
//! parse JSON, check the request schema, extract fields, resolve the
//! capability key, open the envelope, check the operation schema, extract
//! the operation, dispatch by method name, and encode the result.
//!
//! Security posture: request bodies are untrusted. Store and decryption
//! failures collapse to one opaque message so callers cannot probe which
//! identities exist. Handler errors and panics are contained here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;

use guardian_config::GuardianConfig;
use guardian_core::AeadSecretChannel;
use guardian_core::CapabilityRequest;
use guardian_core::CapabilitySchemas;
use guardian_core::CapabilityStore;
use guardian_core::CapabilityStoreError;
use guardian_core::DispatchError;
use guardian_core::EndpointRegistry;
use guardian_core::OperationHandler;
use guardian_core::OperationMessage;
use guardian_core::SecretChannel;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::audit::CapabilityAuditEvent;
use crate::audit::CapabilityAuditEventParams;
use crate::audit::GuardianAuditSink;
use crate::audit::GuardianNoopAuditSink;
use crate::audit::RequestOutcome;
use crate::audit::StartupAuditEvent;
use crate::operations::HandlerTable;
use crate::operations::OperationModuleRegistry;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Dispatcher construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppInitError {
    /// Configuration does not name an operations module.
    #[error("configuration is missing guardian_service.operations")]
    MissingOperationsModule,
    /// Named operations module is not registered.
    #[error("unknown operations module: {0}")]
    UnknownOperationsModule(String),
    /// A handler constructor failed.
    #[error("handler {operation} failed to initialize: {message}")]
    Handler {
        /// Operation whose constructor failed.
        operation: String,
        /// Constructor error message.
        message: String,
    },
    /// Wire schemas failed to compile.
    #[error("schema initialization failed: {0}")]
    Schema(String),
}

// ============================================================================
// SECTION: Response
// ============================================================================

/// Result of handling one capability request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityResponse {
    /// Handler result serialized as JSON bytes.
    Success(Vec<u8>),
    /// Dispatch failure.
    Failure(DispatchError),
}

impl CapabilityResponse {
    /// Returns true for successful responses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the bytes sent to the caller.
    #[must_use]
    pub fn body(&self) -> Vec<u8> {
        match self {
            Self::Success(bytes) => bytes.clone(),
            Self::Failure(error) => error.public_message().into_bytes(),
        }
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Capability invocation dispatcher.
///
/// # Invariants
/// - The handler table is fixed after construction.
/// - Every call to [`ProcessCapabilityApp::handle`] yields exactly one response.
/// - No state is retained between requests; handlers own their own state.
#[derive(Clone)]
pub struct ProcessCapabilityApp {
    /// Resolved operations module name.
    operations_module: String,
    /// Capability key lookup.
    store: Arc<dyn CapabilityStore>,
    /// Envelope decryption.
    channel: Arc<dyn SecretChannel>,
    /// Known contract service endpoints.
    endpoints: Arc<EndpointRegistry>,
    /// Handlers keyed by operation name.
    handlers: Arc<HandlerTable>,
    /// Compiled wire schemas.
    schemas: Arc<CapabilitySchemas>,
    /// Audit sink for request events.
    audit: Arc<dyn GuardianAuditSink>,
}

impl ProcessCapabilityApp {
    /// Builds the dispatcher and instantiates every handler of the configured module.
    ///
    /// # Errors
    ///
    /// Returns [`AppInitError`] when the module is missing or unknown, a
    /// handler fails to initialize, or the schemas fail to compile.
    pub fn new(
        config: &GuardianConfig,
        store: Arc<dyn CapabilityStore>,
        endpoints: EndpointRegistry,
        modules: &OperationModuleRegistry,
    ) -> Result<Self, AppInitError> {
        let operations_module =
            config.operations_module().ok_or(AppInitError::MissingOperationsModule)?.to_string();
        let module = modules
            .get(&operations_module)
            .ok_or_else(|| AppInitError::UnknownOperationsModule(operations_module.clone()))?;
        let handlers = module.instantiate(config).map_err(|(operation, err)| {
            AppInitError::Handler {
                operation,
                message: err.to_string(),
            }
        })?;
        let schemas = CapabilitySchemas::compile().map_err(|err| AppInitError::Schema(err.to_string()))?;
        Ok(Self {
            operations_module,
            store,
            channel: Arc::new(AeadSecretChannel),
            endpoints: Arc::new(endpoints),
            handlers: Arc::new(handlers),
            schemas: Arc::new(schemas),
            audit: Arc::new(GuardianNoopAuditSink),
        })
    }

    /// Replaces the secret channel codec.
    #[must_use]
    pub fn with_secret_channel(mut self, channel: Arc<dyn SecretChannel>) -> Self {
        self.channel = channel;
        self
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn GuardianAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the resolved operations module name.
    #[must_use]
    pub fn operations_module(&self) -> &str {
        &self.operations_module
    }

    /// Returns operation names in sorted order.
    #[must_use]
    pub fn operation_names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Returns the endpoint registry.
    #[must_use]
    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    /// Emits the startup audit event.
    pub fn record_startup(&self) {
        self.audit.record_startup(&StartupAuditEvent::new(
            self.operations_module.clone(),
            self.operation_names(),
            self.endpoints.len(),
        ));
    }

    /// Handles one raw request body.
    #[must_use]
    pub fn handle(&self, body: &[u8]) -> CapabilityResponse {
        let mut trace = RequestTrace::default();
        let response = match self.dispatch(body, &mut trace) {
            Ok(bytes) => CapabilityResponse::Success(bytes),
            Err(error) => CapabilityResponse::Failure(error),
        };
        self.record(&response, trace, body.len());
        response
    }

    /// Runs the dispatch pipeline.
    fn dispatch(&self, body: &[u8], trace: &mut RequestTrace) -> Result<Vec<u8>, DispatchError> {
        let document: Value =
            serde_json::from_slice(body).map_err(|_| DispatchError::InvalidJson)?;
        if !self.schemas.validate_request(&document) {
            trace.violation = self.schemas.request_violation(&document);
            return Err(DispatchError::InvalidJson);
        }
        let request = CapabilityRequest::from_document(&document)?;
        trace.identity_fingerprint = Some(request.minted_identity.fingerprint());

        let key = self
            .store
            .capability_key(&request.minted_identity)
            .map_err(|err| DispatchError::Unpack(store_failure_detail(&err)))?;
        let plaintext = self
            .channel
            .open(&key, &request.operation)
            .map_err(|err| DispatchError::Unpack(err.to_string()))?;

        if !self.schemas.validate_operation(&plaintext) {
            trace.violation = self.schemas.operation_violation(&plaintext);
            return Err(DispatchError::InvalidJson);
        }
        let message = OperationMessage::from_document(&plaintext)?;
        trace.method = Some(message.method_name.clone());

        let handler = self
            .handlers
            .get(&message.method_name)
            .ok_or_else(|| DispatchError::UnknownOperation(message.method_name.clone()))?;
        let result = invoke_contained(handler.as_ref(), &message.parameters)?;
        serde_json::to_vec(&result).map_err(|err| DispatchError::OperationException(err.to_string()))
    }

    /// Records the audit event for a finished request.
    fn record(&self, response: &CapabilityResponse, trace: RequestTrace, request_bytes: usize) {
        let (outcome, error_kind, detail) = match response {
            CapabilityResponse::Success(_) => (RequestOutcome::Success, None, None),
            CapabilityResponse::Failure(error) => (
                RequestOutcome::Error,
                Some(error.kind()),
                error.detail().map(str::to_string).or(trace.violation),
            ),
        };
        self.audit.record(&CapabilityAuditEvent::new(CapabilityAuditEventParams {
            outcome,
            error_kind,
            detail,
            method: trace.method,
            identity_fingerprint: trace.identity_fingerprint,
            request_bytes,
            response_bytes: response.body().len(),
        }));
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Request facts gathered for the audit record.
#[derive(Default)]
struct RequestTrace {
    /// Method name once decrypted.
    method: Option<String>,
    /// Identity fingerprint once parsed.
    identity_fingerprint: Option<String>,
    /// First schema violation, when a schema check failed.
    violation: Option<String>,
}

/// Maps a store failure to audit detail that never names the identity.
fn store_failure_detail(error: &CapabilityStoreError) -> String {
    match error {
        CapabilityStoreError::NotFound(_) => "capability not found".to_string(),
        CapabilityStoreError::AlreadyExists(_) => "capability already exists".to_string(),
        CapabilityStoreError::Store(message) => format!("capability store error: {message}"),
    }
}

/// Invokes a handler, converting errors, panics, and empty results.
fn invoke_contained(
    handler: &dyn OperationHandler,
    parameters: &Map<String, Value>,
) -> Result<Value, DispatchError> {
    let outcome = catch_unwind(AssertUnwindSafe(|| handler.invoke(parameters)))
        .map_err(|_| DispatchError::OperationException("handler panicked".to_string()))?;
    match outcome {
        Ok(Some(Value::Null) | None) => Err(DispatchError::OperationFailed),
        Ok(Some(value)) => Ok(value),
        Err(err) => Err(DispatchError::OperationException(err.to_string())),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
