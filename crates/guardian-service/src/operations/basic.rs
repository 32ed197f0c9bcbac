// crates/guardian-service/src/operations/basic.rs
// ============================================================================
// Module: Basic Operations
// Description: Stateless status and echo operations.
// Purpose: Provide a minimal operations module for health checks and wiring.
// Dependencies: guardian-core, serde_json
// ============================================================================

//! ## Overview
//! `guardian.operations.basic` exposes `get_status`, which always reports
//! `{"status":"ok"}`, and `echo`, which returns its parameters. An `echo`
//! with no parameters yields an empty result.

use guardian_config::GuardianConfig;
use guardian_core::HandlerError;
use guardian_core::OperationHandler;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::operations::OperationModule;

/// Module name referenced by configuration.
pub const MODULE_NAME: &str = "guardian.operations.basic";

/// Builds the basic operations module.
#[must_use]
pub fn module() -> OperationModule {
    OperationModule::new(MODULE_NAME)
        .with_operation("get_status", |_: &GuardianConfig| {
            Ok(Box::new(GetStatus) as Box<dyn OperationHandler>)
        })
        .with_operation("echo", |_: &GuardianConfig| Ok(Box::new(Echo) as Box<dyn OperationHandler>))
}

/// Reports service liveness.
struct GetStatus;

impl OperationHandler for GetStatus {
    fn invoke(&self, _parameters: &Map<String, Value>) -> Result<Option<Value>, HandlerError> {
        Ok(Some(json!({ "status": "ok" })))
    }
}

/// Returns the request parameters.
struct Echo;

impl OperationHandler for Echo {
    fn invoke(&self, parameters: &Map<String, Value>) -> Result<Option<Value>, HandlerError> {
        if parameters.is_empty() {
            return Ok(None);
        }
        Ok(Some(Value::Object(parameters.clone())))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use guardian_config::GuardianConfig;
    use serde_json::Map;
    use serde_json::json;

    use super::module;

    #[test]
    fn echo_returns_parameters_or_nothing() {
        let table = module().instantiate(&GuardianConfig::default()).unwrap();
        let echo = table.get("echo").unwrap();
        assert_eq!(echo.invoke(&Map::new()).unwrap(), None);
        let mut parameters = Map::new();
        parameters.insert("a".to_string(), json!([1, 2]));
        assert_eq!(echo.invoke(&parameters).unwrap(), Some(json!({ "a": [1, 2] })));
    }
}
