// crates/guardian-service/src/audit.rs
// ============================================================================
// Module: Guardian Audit Logging
// Description: Structured audit events for capability dispatch.
// Purpose: Emit redacted JSON-line audit records without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for capability request
//! logging. Events carry a SHA-256 fingerprint of the minted identity, never
//! the identity itself or any key material. Opaque error detail and schema
//! violation locations are recorded here and nowhere else.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome of a capability request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Handler result returned to the caller.
    Success,
    /// Error response returned to the caller.
    Error,
}

/// Capability request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request outcome.
    pub outcome: RequestOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Server-side error detail: opaque error causes and schema violations.
    pub detail: Option<String>,
    /// Requested method name, once decrypted.
    pub method: Option<String>,
    /// SHA-256 fingerprint of the minted identity, once parsed.
    pub identity_fingerprint: Option<String>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

/// Inputs required to construct a capability audit event.
pub struct CapabilityAuditEventParams {
    /// Request outcome.
    pub outcome: RequestOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Server-side error detail: opaque error causes and schema violations.
    pub detail: Option<String>,
    /// Requested method name, once decrypted.
    pub method: Option<String>,
    /// SHA-256 fingerprint of the minted identity, once parsed.
    pub identity_fingerprint: Option<String>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

impl CapabilityAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: CapabilityAuditEventParams) -> Self {
        Self {
            event: "capability_request",
            timestamp_ms: now_millis(),
            outcome: params.outcome,
            error_kind: params.error_kind,
            detail: params.detail,
            method: params.method,
            identity_fingerprint: params.identity_fingerprint,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
        }
    }
}

/// Dispatcher startup audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct StartupAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Configured operations module.
    pub operations_module: String,
    /// Operation names in the handler table.
    pub operations: Vec<String>,
    /// Number of registered endpoints.
    pub endpoint_count: usize,
}

impl StartupAuditEvent {
    /// Creates a new startup event with a consistent timestamp.
    #[must_use]
    pub fn new(operations_module: String, operations: Vec<String>, endpoint_count: usize) -> Self {
        Self {
            event: "guardian_startup",
            timestamp_ms: now_millis(),
            operations_module,
            operations,
            endpoint_count,
        }
    }
}

/// Returns the current unix epoch in milliseconds.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for guardian events.
pub trait GuardianAuditSink: Send + Sync {
    /// Record a capability request event.
    fn record(&self, event: &CapabilityAuditEvent);

    /// Record a startup event.
    fn record_startup(&self, _event: &StartupAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct GuardianStderrAuditSink;

impl GuardianAuditSink for GuardianStderrAuditSink {
    fn record(&self, event: &CapabilityAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }

    fn record_startup(&self, event: &StartupAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct GuardianFileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl GuardianFileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl GuardianAuditSink for GuardianFileAuditSink {
    fn record(&self, event: &CapabilityAuditEvent) {
        self.append(event);
    }

    fn record_startup(&self, event: &StartupAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct GuardianNoopAuditSink;

impl GuardianAuditSink for GuardianNoopAuditSink {
    fn record(&self, _event: &CapabilityAuditEvent) {}
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
        reason = "Test-only assertions."
    )]

    use serde_json::Value;

    use super::CapabilityAuditEvent;
    use super::CapabilityAuditEventParams;
    use super::GuardianAuditSink;
    use super::GuardianFileAuditSink;
    use super::RequestOutcome;
    use super::StartupAuditEvent;

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = GuardianFileAuditSink::new(&path).unwrap();
        sink.record_startup(&StartupAuditEvent::new(
            "guardian.operations.basic".to_string(),
            vec!["echo".to_string(), "get_status".to_string()],
            0,
        ));
        sink.record(&CapabilityAuditEvent::new(CapabilityAuditEventParams {
            outcome: RequestOutcome::Error,
            error_kind: Some("unpack_failed"),
            detail: Some("capability not found".to_string()),
            method: None,
            identity_fingerprint: Some("abc".to_string()),
            request_bytes: 10,
            response_bytes: 41,
        }));
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> =
            content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "guardian_startup");
        assert_eq!(lines[1]["event"], "capability_request");
        assert_eq!(lines[1]["outcome"], "error");
        assert_eq!(lines[1]["error_kind"], "unpack_failed");
    }
}
