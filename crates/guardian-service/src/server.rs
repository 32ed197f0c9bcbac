// crates/guardian-service/src/server.rs
// ============================================================================
// Module: Guardian HTTP Server
// Description: HTTP surface for the capability invocation dispatcher.
// Purpose: Expose ProcessCapabilityApp over axum with exact response framing.
// Dependencies: guardian-config, guardian-core, guardian-store-sqlite, axum, tokio
// ============================================================================

//! ## Overview
//! The guardian server exposes two routes. `POST /process_capability` feeds
//! the raw body to [`ProcessCapabilityApp::handle`]; successes are returned
//! as `application/octet-stream` JSON with an exact `Content-Length`, and
//! failures as plain-text HTTP 400. `GET /info` describes the loaded module
//! and endpoints. Bodies larger than `server.max_body_bytes` are refused
//! with HTTP 413 before any parsing; other body read failures are HTTP 400.
//!
//! Security posture: inputs are untrusted; the server never echoes opaque
//! error detail.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CONTENT_LENGTH;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use guardian_config::CapabilityStoreType;
use guardian_config::GuardianConfig;
use guardian_core::CapabilityStore;
use guardian_core::EndpointRecord;
use guardian_core::EndpointRegistry;
use guardian_core::InMemoryCapabilityStore;
use guardian_store_sqlite::SqliteCapabilityStore;
use http_body_util::LengthLimitError;
use serde::Serialize;
use tokio::net::TcpListener;

use crate::app::CapabilityResponse;
use crate::app::ProcessCapabilityApp;
use crate::audit::GuardianAuditSink;
use crate::audit::GuardianFileAuditSink;
use crate::audit::GuardianNoopAuditSink;
use crate::audit::GuardianStderrAuditSink;
use crate::operations::OperationModuleRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Route accepting capability invocations.
pub const PROCESS_CAPABILITY_ROUTE: &str = "/process_capability";
/// Route describing the running service.
pub const INFO_ROUTE: &str = "/info";
/// Service name reported by `/info`.
pub const SERVICE_NAME: &str = "capability-guardian";
/// Message for bodies over the configured limit.
pub const MSG_BODY_TOO_LARGE: &str = "request body too large";
/// Response body when the request body could not be read.
pub const MSG_BODY_UNREADABLE: &str = "failed to read request body";
/// Content type of successful responses.
const SUCCESS_CONTENT_TYPE: &str = "application/octet-stream";
/// Content type of error responses.
const ERROR_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
/// Header carrying the body transfer encoding.
const CONTENT_TRANSFER_ENCODING: &str = "content-transfer-encoding";

// ============================================================================
// SECTION: Guardian Server
// ============================================================================

/// Guardian HTTP server instance.
pub struct GuardianServer {
    /// Listen address.
    bind: SocketAddr,
    /// Shared state for route handlers.
    state: Arc<ServerState>,
}

impl GuardianServer {
    /// Builds a server from configuration using the built-in operation modules.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianServerError`] when initialization fails.
    pub fn from_config(config: GuardianConfig) -> Result<Self, GuardianServerError> {
        Self::from_config_with_modules(config, &OperationModuleRegistry::with_builtin_modules())
    }

    /// Builds a server from configuration and an explicit module registry.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianServerError`] when initialization fails.
    pub fn from_config_with_modules(
        config: GuardianConfig,
        modules: &OperationModuleRegistry,
    ) -> Result<Self, GuardianServerError> {
        config.validate().map_err(|err| GuardianServerError::Config(err.to_string()))?;
        let bind = config.server.bind_addr().map_err(|err| GuardianServerError::Config(err.to_string()))?;
        let max_body_bytes = config.server.max_body_bytes;
        let store = build_capability_store(&config)?;
        let endpoints = EndpointRegistry::from_records(config.endpoint_records())
            .map_err(|err| GuardianServerError::Config(err.to_string()))?;
        let audit = build_audit_sink(&config)?;
        let app = ProcessCapabilityApp::new(&config, store, endpoints, modules)
            .map_err(|err| GuardianServerError::Init(err.to_string()))?
            .with_audit_sink(audit);
        app.record_startup();
        Ok(Self {
            bind,
            state: Arc::new(ServerState {
                app,
                max_body_bytes,
            }),
        })
    }

    /// Returns the configured listen address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Returns the dispatcher.
    #[must_use]
    pub fn app(&self) -> &ProcessCapabilityApp {
        &self.state.app
    }

    /// Builds the axum router.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route(PROCESS_CAPABILITY_ROUTE, post(handle_process_capability))
            .route(INFO_ROUTE, get(handle_info))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), GuardianServerError> {
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|_| GuardianServerError::Transport("http bind failed".to_string()))?;
        self.serve_listener(listener).await
    }

    /// Serves on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`GuardianServerError`] when serving fails.
    pub async fn serve_listener(self, listener: TcpListener) -> Result<(), GuardianServerError> {
        axum::serve(listener, self.router())
            .await
            .map_err(|_| GuardianServerError::Transport("http server failed".to_string()))
    }
}

/// Builds the capability store from configuration.
fn build_capability_store(
    config: &GuardianConfig,
) -> Result<Arc<dyn CapabilityStore>, GuardianServerError> {
    let store: Arc<dyn CapabilityStore> = match config.capability_store.store_type {
        CapabilityStoreType::Memory => {
            let store = InMemoryCapabilityStore::new();
            for entry in &config.capability_store.keys {
                let (identity, key) =
                    entry.decode().map_err(|err| GuardianServerError::Config(err.to_string()))?;
                store.insert(identity, key).map_err(|err| GuardianServerError::Init(err.to_string()))?;
            }
            Arc::new(store)
        }
        CapabilityStoreType::Sqlite => {
            let sqlite_config = config.capability_store.sqlite_config().ok_or_else(|| {
                GuardianServerError::Config("sqlite capability_store requires path".to_string())
            })?;
            let store = SqliteCapabilityStore::new(&sqlite_config)
                .map_err(|err| GuardianServerError::Init(err.to_string()))?;
            Arc::new(store)
        }
    };
    Ok(store)
}

/// Builds the audit sink from configuration.
fn build_audit_sink(
    config: &GuardianConfig,
) -> Result<Arc<dyn GuardianAuditSink>, GuardianServerError> {
    let audit = &config.server.audit;
    if !audit.enabled {
        return Ok(Arc::new(GuardianNoopAuditSink));
    }
    match &audit.path {
        Some(path) => {
            let sink = GuardianFileAuditSink::new(Path::new(path.trim()))
                .map_err(|err| GuardianServerError::Init(format!("audit log: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(GuardianStderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Route Handlers
// ============================================================================

/// Shared server state for route handlers.
struct ServerState {
    /// Capability dispatcher.
    app: ProcessCapabilityApp,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

/// Service description returned by `/info`.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    /// Service name.
    pub service: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Loaded operations module.
    pub operations_module: String,
    /// Operation names in sorted order.
    pub operations: Vec<String>,
    /// Registered endpoints.
    pub endpoints: Vec<EndpointRecord>,
}

/// Handles capability invocations.
async fn handle_process_capability(
    State(state): State<Arc<ServerState>>,
    body: Body,
) -> Response {
    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => return body_error_response(&err),
    };
    let response = handle_with_blocking(&state.app, &bytes);
    response.into_response()
}

/// Maps a body read failure to 413 for the size limit and 400 otherwise.
fn body_error_response(err: &axum::Error) -> Response {
    if is_length_limit(err) {
        text_response(StatusCode::PAYLOAD_TOO_LARGE, MSG_BODY_TOO_LARGE.to_string())
    } else {
        text_response(StatusCode::BAD_REQUEST, MSG_BODY_UNREADABLE.to_string())
    }
}

/// Returns true when the body exceeded the configured limit.
fn is_length_limit(err: &axum::Error) -> bool {
    StdError::source(err).is_some_and(|source| source.is::<LengthLimitError>())
}

/// Handles service description requests.
async fn handle_info(State(state): State<Arc<ServerState>>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        operations_module: state.app.operations_module().to_string(),
        operations: state.app.operation_names(),
        endpoints: state.app.endpoints().records(),
    })
}

/// Runs dispatch, shifting to a blocking context when available.
fn handle_with_blocking(app: &ProcessCapabilityApp, body: &[u8]) -> CapabilityResponse {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| app.handle(body))
        }
        _ => app.handle(body),
    }
}

// ============================================================================
// SECTION: Response Framing
// ============================================================================

impl IntoResponse for CapabilityResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Success(bytes) => success_response(bytes),
            Self::Failure(error) => text_response(StatusCode::BAD_REQUEST, error.public_message()),
        }
    }
}

/// Builds a successful octet-stream response.
fn success_response(bytes: Vec<u8>) -> Response {
    let length = bytes.len();
    let mut response = (StatusCode::OK, bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(SUCCESS_CONTENT_TYPE));
    headers.insert(
        HeaderName::from_static(CONTENT_TRANSFER_ENCODING),
        HeaderValue::from_static("utf-8"),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    response
}

/// Builds a plain-text response.
fn text_response(status: StatusCode, message: String) -> Response {
    let length = message.len();
    let mut response = (status, message).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(ERROR_CONTENT_TYPE));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    response
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Guardian server errors.
#[derive(Debug, thiserror::Error)]
pub enum GuardianServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only framing assertions."
    )]

    use std::io;

    use axum::body::Body;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use axum::http::header::CONTENT_LENGTH;
    use axum::http::header::CONTENT_TYPE;
    use axum::response::IntoResponse;
    use guardian_core::DispatchError;

    use super::CONTENT_TRANSFER_ENCODING;
    use super::MSG_BODY_TOO_LARGE;
    use super::MSG_BODY_UNREADABLE;
    use super::body_error_response;
    use super::is_length_limit;
    use super::text_response;
    use crate::app::CapabilityResponse;

    #[test]
    fn success_framing_sets_exact_headers() {
        let response = CapabilityResponse::Success(br#"{"status":"ok"}"#.to_vec()).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(headers[CONTENT_TRANSFER_ENCODING], "utf-8");
        assert_eq!(headers[CONTENT_LENGTH], "15");
    }

    #[test]
    fn failure_framing_is_plain_text_400() {
        let response =
            CapabilityResponse::Failure(DispatchError::UnknownOperation("x".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let headers = response.headers();
        assert_eq!(headers[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(headers[CONTENT_LENGTH], "20");
    }

    #[test]
    fn body_limit_response_is_413() {
        let response = text_response(StatusCode::PAYLOAD_TOO_LARGE, MSG_BODY_TOO_LARGE.to_string());
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()[CONTENT_LENGTH], "22");
    }

    #[tokio::test]
    async fn only_the_length_limit_maps_to_413() {
        let err = to_bytes(Body::from(vec![0u8; 8]), 4).await.unwrap_err();
        assert!(is_length_limit(&err));
        assert_eq!(body_error_response(&err).status(), StatusCode::PAYLOAD_TOO_LARGE);

        let aborted = axum::Error::new(io::Error::new(io::ErrorKind::ConnectionReset, "client went away"));
        assert!(!is_length_limit(&aborted));
        let response = body_error_response(&aborted);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_LENGTH], MSG_BODY_UNREADABLE.len().to_string());
    }
}
