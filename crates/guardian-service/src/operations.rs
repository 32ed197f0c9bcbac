// crates/guardian-service/src/operations.rs
// ============================================================================
// Module: Operation Modules
// Description: Named tables of operation handler constructors.
// Purpose: Resolve the configured operations module into a handler table.
// Dependencies: guardian-config, guardian-core
// ============================================================================

//! ## Overview
//! An operations module is a named table mapping operation names to handler
//! constructors. Modules are registered in an [`OperationModuleRegistry`] at
//! build time; configuration selects one by name. At startup the dispatcher
//! calls every constructor in the selected module once and keeps the
//! resulting handlers for the life of the process.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod basic;
pub mod counter;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use guardian_config::GuardianConfig;
use guardian_core::HandlerError;
use guardian_core::OperationHandler;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Builds a handler from the dispatcher configuration.
pub type HandlerConstructor =
    Arc<dyn Fn(&GuardianConfig) -> Result<Box<dyn OperationHandler>, HandlerError> + Send + Sync>;

/// Handler table keyed by operation name.
pub type HandlerTable = BTreeMap<String, Arc<dyn OperationHandler>>;

/// Operation module registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationModuleError {
    /// Module name is already registered.
    #[error("operations module already registered: {0}")]
    Duplicate(String),
    /// Module has no operations.
    #[error("operations module has no operations: {0}")]
    Empty(String),
}

// ============================================================================
// SECTION: Operation Module
// ============================================================================

/// Named table of handler constructors.
#[derive(Clone)]
pub struct OperationModule {
    /// Module name referenced by configuration.
    name: String,
    /// Constructors keyed by operation name.
    constructors: BTreeMap<String, HandlerConstructor>,
}

impl OperationModule {
    /// Creates an empty module.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructors: BTreeMap::new(),
        }
    }

    /// Adds an operation constructor, replacing any earlier entry of the same name.
    #[must_use]
    pub fn with_operation<F>(mut self, operation: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&GuardianConfig) -> Result<Box<dyn OperationHandler>, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(operation.into(), Arc::new(constructor));
        self
    }

    /// Returns the module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns operation names in sorted order.
    #[must_use]
    pub fn operation_names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Constructs one handler per operation.
    ///
    /// # Errors
    ///
    /// Returns the failing operation name and [`HandlerError`] when any
    /// constructor fails.
    pub fn instantiate(
        &self,
        config: &GuardianConfig,
    ) -> Result<HandlerTable, (String, HandlerError)> {
        let mut table = HandlerTable::new();
        for (operation, constructor) in &self.constructors {
            let handler = constructor(config).map_err(|err| (operation.clone(), err))?;
            table.insert(operation.clone(), Arc::from(handler));
        }
        Ok(table)
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registry of operation modules available to the dispatcher.
#[derive(Clone, Default)]
pub struct OperationModuleRegistry {
    /// Modules keyed by name.
    modules: BTreeMap<String, OperationModule>,
}

impl OperationModuleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in modules.
    #[must_use]
    pub fn with_builtin_modules() -> Self {
        let mut modules = BTreeMap::new();
        for module in [basic::module(), counter::module()] {
            modules.insert(module.name().to_string(), module);
        }
        Self {
            modules,
        }
    }

    /// Registers a module.
    ///
    /// # Errors
    ///
    /// Returns [`OperationModuleError`] when the name is taken or the module
    /// has no operations.
    pub fn register(&mut self, module: OperationModule) -> Result<(), OperationModuleError> {
        if module.constructors.is_empty() {
            return Err(OperationModuleError::Empty(module.name));
        }
        if self.modules.contains_key(module.name()) {
            return Err(OperationModuleError::Duplicate(module.name));
        }
        self.modules.insert(module.name.clone(), module);
        Ok(())
    }

    /// Looks up a module by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OperationModule> {
        self.modules.get(name)
    }

    /// Returns registered module names in sorted order.
    #[must_use]
    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
