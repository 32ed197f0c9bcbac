// crates/guardian-service/src/lib.rs
// ============================================================================
// Module: Capability Guardian Service Library
// Description: Dispatcher, operation modules, audit sinks, and HTTP surface.
// Purpose: Serve capability invocations backed by the guardian core.
// Dependencies: crate::{app, audit, operations, server}
// ============================================================================

//! ## Overview
//! The guardian service wires the core wire types and secret channel into a
//! running process. [`ProcessCapabilityApp`] turns one request body into one
//! response, [`OperationModuleRegistry`] resolves the configured operations
//! module, and [`GuardianServer`] exposes the dispatcher over HTTP.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod app;
pub mod audit;
pub mod operations;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use app::AppInitError;
pub use app::CapabilityResponse;
pub use app::ProcessCapabilityApp;
pub use audit::CapabilityAuditEvent;
pub use audit::GuardianAuditSink;
pub use audit::GuardianFileAuditSink;
pub use audit::GuardianNoopAuditSink;
pub use audit::GuardianStderrAuditSink;
pub use audit::RequestOutcome;
pub use audit::StartupAuditEvent;
pub use operations::HandlerConstructor;
pub use operations::HandlerTable;
pub use operations::OperationModule;
pub use operations::OperationModuleError;
pub use operations::OperationModuleRegistry;
pub use server::GuardianServer;
pub use server::GuardianServerError;
pub use server::ServiceInfo;
