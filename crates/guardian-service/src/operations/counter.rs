// crates/guardian-service/src/operations/counter.rs
// ============================================================================
// Module: Counter Operations
// Description: Shared counter with increment and read operations.
// Purpose: Exercise handler-owned state under concurrent dispatch.
// Dependencies: guardian-config, guardian-core, serde_json
// ============================================================================

//! ## Overview
//! `guardian.operations.counter` exposes `inc_value` and `get_value` over one
//! atomic counter owned by the module. `inc_value` accepts an optional
//! positive integer `by` (default 1). When `guardian_service.settings`
//! carries `counter_limit`, increments that would pass it fail.
//!
//! # Invariants
//! - The counter never exceeds the configured limit.
//! - Increments are linearizable; concurrent callers observe distinct values.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use guardian_config::GuardianConfig;
use guardian_core::HandlerError;
use guardian_core::OperationHandler;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::operations::OperationModule;

/// Module name referenced by configuration.
pub const MODULE_NAME: &str = "guardian.operations.counter";
/// Settings key holding the optional counter limit.
pub const SETTING_COUNTER_LIMIT: &str = "counter_limit";

/// Builds the counter operations module with a fresh counter.
#[must_use]
pub fn module() -> OperationModule {
    let value = Arc::new(AtomicU64::new(0));
    let inc_value = Arc::clone(&value);
    OperationModule::new(MODULE_NAME)
        .with_operation("inc_value", move |config: &GuardianConfig| {
            Ok(Box::new(IncValue {
                value: Arc::clone(&inc_value),
                limit: counter_limit(config)?,
            }) as Box<dyn OperationHandler>)
        })
        .with_operation("get_value", move |_: &GuardianConfig| {
            Ok(Box::new(GetValue {
                value: Arc::clone(&value),
            }) as Box<dyn OperationHandler>)
        })
}

/// Reads the optional counter limit from handler settings.
fn counter_limit(config: &GuardianConfig) -> Result<Option<u64>, HandlerError> {
    match config.guardian_service.settings.get(SETTING_COUNTER_LIMIT) {
        None => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            HandlerError::Init(format!("{SETTING_COUNTER_LIMIT} must be a non-negative integer"))
        }),
    }
}

/// Increments the shared counter.
struct IncValue {
    /// Shared counter.
    value: Arc<AtomicU64>,
    /// Optional inclusive upper bound.
    limit: Option<u64>,
}

impl OperationHandler for IncValue {
    fn invoke(&self, parameters: &Map<String, Value>) -> Result<Option<Value>, HandlerError> {
        let step = match parameters.get("by") {
            None => 1,
            Some(raw) => raw.as_u64().filter(|step| *step > 0).ok_or_else(|| {
                HandlerError::InvalidParameters("by must be a positive integer".to_string())
            })?,
        };
        let limit = self.limit.unwrap_or(u64::MAX);
        let previous = self
            .value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_add(step).filter(|next| *next <= limit)
            })
            .map_err(|current| {
                HandlerError::Failed(format!("counter at {current} cannot advance by {step}"))
            })?;
        Ok(Some(json!({ "value": previous + step })))
    }
}

/// Reads the shared counter.
struct GetValue {
    /// Shared counter.
    value: Arc<AtomicU64>,
}

impl OperationHandler for GetValue {
    fn invoke(&self, _parameters: &Map<String, Value>) -> Result<Option<Value>, HandlerError> {
        Ok(Some(json!({ "value": self.value.load(Ordering::SeqCst) })))
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use std::thread;

    use guardian_config::GuardianConfig;
    use guardian_core::HandlerError;
    use serde_json::Map;
    use serde_json::json;

    use super::SETTING_COUNTER_LIMIT;
    use super::module;

    fn config_with_limit(limit: serde_json::Value) -> GuardianConfig {
        let mut config = GuardianConfig::default();
        config.guardian_service.settings.insert(SETTING_COUNTER_LIMIT.to_string(), limit);
        config
    }

    #[test]
    fn increments_are_visible_to_reads() {
        let table = module().instantiate(&GuardianConfig::default()).unwrap();
        let mut parameters = Map::new();
        parameters.insert("by".to_string(), json!(5));
        table["inc_value"].invoke(&parameters).unwrap();
        table["inc_value"].invoke(&Map::new()).unwrap();
        assert_eq!(table["get_value"].invoke(&Map::new()).unwrap(), Some(json!({ "value": 6 })));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let table = module().instantiate(&GuardianConfig::default()).unwrap();
        thread::scope(|scope| {
            for _ in 0..8 {
                let handler = &table["inc_value"];
                scope.spawn(move || {
                    for _ in 0..100 {
                        handler.invoke(&Map::new()).unwrap();
                    }
                });
            }
        });
        assert_eq!(table["get_value"].invoke(&Map::new()).unwrap(), Some(json!({ "value": 800 })));
    }

    #[test]
    fn limit_stops_the_counter() {
        let table = module().instantiate(&config_with_limit(json!(2))).unwrap();
        table["inc_value"].invoke(&Map::new()).unwrap();
        table["inc_value"].invoke(&Map::new()).unwrap();
        let error = table["inc_value"].invoke(&Map::new()).unwrap_err();
        assert!(matches!(error, HandlerError::Failed(_)));
        assert_eq!(table["get_value"].invoke(&Map::new()).unwrap(), Some(json!({ "value": 2 })));
    }

    #[test]
    fn invalid_limit_fails_construction() {
        let Err((operation, error)) = module().instantiate(&config_with_limit(json!("ten"))) else {
            panic!("expected construction failure");
        };
        assert_eq!(operation, "inc_value");
        assert!(matches!(error, HandlerError::Init(_)));
    }

    #[test]
    fn non_positive_step_is_rejected() {
        let table = module().instantiate(&GuardianConfig::default()).unwrap();
        let mut parameters = Map::new();
        parameters.insert("by".to_string(), json!(0));
        let error = table["inc_value"].invoke(&parameters).unwrap_err();
        assert!(matches!(error, HandlerError::InvalidParameters(_)));
    }
}
