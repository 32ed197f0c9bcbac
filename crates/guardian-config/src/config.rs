// crates/guardian-config/src/config.rs
// ============================================================================
// Module: Guardian Configuration
// Description: Configuration loading and validation for the capability guardian.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: guardian-core, guardian-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed so the guardian never starts
//! serving with an undefined handler table or an exposed bind address.
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use guardian_core::CapabilityKey;
use guardian_core::EndpointRecord;
use guardian_core::MintedIdentity;
use guardian_store_sqlite::SqliteStoreConfig;
use guardian_store_sqlite::SqliteStoreMode;
use guardian_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "guardian.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "GUARDIAN_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default HTTP bind address.
pub(crate) const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default maximum request body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Upper bound for `server.max_body_bytes`.
pub const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Maximum number of seeded capability keys.
pub(crate) const MAX_SEEDED_KEYS: usize = 1024;
/// Maximum number of configured endpoints.
pub(crate) const MAX_ENDPOINTS: usize = 256;
/// Maximum length of identifiers such as identities and endpoint ids.
pub(crate) const MAX_IDENTIFIER_LENGTH: usize = 512;
/// Default `SQLite` busy timeout (ms).
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Capability guardian configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuardianConfig {
    /// Dispatcher configuration.
    #[serde(default, alias = "GuardianService")]
    pub guardian_service: GuardianServiceConfig,
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Capability store configuration.
    #[serde(default)]
    pub capability_store: CapabilityStoreConfig,
    /// Known contract service endpoints.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl GuardianConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.guardian_service.validate()?;
        self.server.validate()?;
        self.capability_store.validate()?;
        validate_endpoints(&self.endpoints)?;
        Ok(())
    }

    /// Returns the configured operations module name, if set.
    #[must_use]
    pub fn operations_module(&self) -> Option<&str> {
        self.guardian_service.operations.as_deref().map(str::trim).filter(|name| !name.is_empty())
    }

    /// Returns endpoint records in configuration order, trimmed as validated.
    #[must_use]
    pub fn endpoint_records(&self) -> Vec<EndpointRecord> {
        self.endpoints
            .iter()
            .map(|endpoint| EndpointRecord {
                endpoint_id: endpoint.endpoint_id.trim().to_string(),
                url: endpoint.url.trim().to_string(),
            })
            .collect()
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuardianServiceConfig {
    /// Name of the registered operations module.
    #[serde(default, alias = "Operations")]
    pub operations: Option<String>,
    /// Free-form settings handed to handler constructors.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl GuardianServiceConfig {
    /// Validates dispatcher configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let Some(operations) = &self.operations else {
            return Err(ConfigError::Invalid("guardian_service.operations must be set".to_string()));
        };
        let trimmed = operations.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Invalid(
                "guardian_service.operations must be non-empty".to_string(),
            ));
        }
        if trimmed.len() > MAX_IDENTIFIER_LENGTH {
            return Err(ConfigError::Invalid(
                "guardian_service.operations exceeds max length".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Permit binding to non-loopback addresses.
    #[serde(default)]
    pub allow_non_loopback: bool,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            allow_non_loopback: false,
            audit: ServerAuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_body_bytes must be at most {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        let addr = self.bind_addr()?;
        if !addr.ip().is_loopback() && !self.allow_non_loopback {
            return Err(ConfigError::Invalid(
                "non-loopback bind requires server.allow_non_loopback".to_string(),
            ));
        }
        self.audit.validate()
    }

    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self.bind.trim();
        if bind.is_empty() {
            return Err(ConfigError::Invalid("server.bind must be non-empty".to_string()));
        }
        bind.parse().map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines). Stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

/// Capability store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityStoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: CapabilityStoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Keys seeded into the in-memory store at startup.
    #[serde(default)]
    pub keys: Vec<CapabilityKeyConfig>,
}

impl Default for CapabilityStoreConfig {
    fn default() -> Self {
        Self {
            store_type: CapabilityStoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            keys: Vec::new(),
        }
    }
}

impl CapabilityStoreConfig {
    /// Validates capability store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            CapabilityStoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory capability_store must not set path".to_string(),
                    ));
                }
            }
            CapabilityStoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite capability_store requires path".to_string())
                })?;
                validate_store_path(path)?;
                if !self.keys.is_empty() {
                    return Err(ConfigError::Invalid(
                        "sqlite capability_store does not accept seeded keys".to_string(),
                    ));
                }
            }
        }
        if self.keys.len() > MAX_SEEDED_KEYS {
            return Err(ConfigError::Invalid(format!(
                "capability_store.keys exceeds max of {MAX_SEEDED_KEYS}"
            )));
        }
        let mut seen = BTreeSet::new();
        for entry in &self.keys {
            entry.validate()?;
            if !seen.insert(entry.identity.trim()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate capability identity: {}",
                    entry.identity.trim()
                )));
            }
        }
        Ok(())
    }

    /// Returns the `SQLite` store config when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (CapabilityStoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }
}

/// Capability store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use `SQLite`-backed durable store.
    Sqlite,
}

/// Seeded capability key entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityKeyConfig {
    /// Minted identity.
    pub identity: String,
    /// Base64-encoded 32-byte key.
    pub key: String,
}

impl CapabilityKeyConfig {
    /// Validates the entry and decodes its key.
    fn validate(&self) -> Result<(), ConfigError> {
        self.decode().map(|_| ())
    }

    /// Returns the minted identity and decoded key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the identity is empty or the key
    /// does not decode to 32 bytes.
    pub fn decode(&self) -> Result<(MintedIdentity, CapabilityKey), ConfigError> {
        let identity = self.identity.trim();
        if identity.is_empty() {
            return Err(ConfigError::Invalid(
                "capability_store.keys identity must be non-empty".to_string(),
            ));
        }
        if identity.len() > MAX_IDENTIFIER_LENGTH {
            return Err(ConfigError::Invalid(
                "capability_store.keys identity exceeds max length".to_string(),
            ));
        }
        let key = CapabilityKey::from_base64(&self.key).map_err(|err| {
            ConfigError::Invalid(format!("capability_store.keys[{identity}]: {err}"))
        })?;
        Ok((MintedIdentity::new(identity), key))
    }
}

/// Contract service endpoint entry.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Endpoint identifier.
    pub endpoint_id: String,
    /// Service URL.
    pub url: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates capability store paths against security limits.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("capability_store path must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("capability_store path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(
                "capability_store path component too long".to_string(),
            ));
        }
    }
    Ok(())
}

/// Validates endpoint entries for uniqueness and URL scheme.
fn validate_endpoints(endpoints: &[EndpointConfig]) -> Result<(), ConfigError> {
    if endpoints.len() > MAX_ENDPOINTS {
        return Err(ConfigError::Invalid(format!("endpoints exceeds max of {MAX_ENDPOINTS}")));
    }
    let mut seen = BTreeSet::new();
    for endpoint in endpoints {
        let id = endpoint.endpoint_id.trim();
        if id.is_empty() {
            return Err(ConfigError::Invalid("endpoint_id must be non-empty".to_string()));
        }
        if id.len() > MAX_IDENTIFIER_LENGTH {
            return Err(ConfigError::Invalid("endpoint_id exceeds max length".to_string()));
        }
        if !seen.insert(id) {
            return Err(ConfigError::Invalid(format!("duplicate endpoint_id: {id}")));
        }
        let url = endpoint.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "endpoint {id} url must start with http:// or https://"
            )));
        }
    }
    Ok(())
}

/// Returns the default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Returns the default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Returns the default audit enablement.
const fn default_audit_enabled() -> bool {
    true
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Tests
// ============================================================================
