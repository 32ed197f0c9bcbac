// crates/guardian-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Capability Store
// Description: Durable CapabilityStore backed by SQLite WAL.
// Purpose: Persist capability keys keyed by minted identity.
// Dependencies: guardian-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`CapabilityStore`] using `SQLite`. Each
//! minted identity owns exactly one row holding its raw key bytes. Reads
//! re-check the key length and fail closed on corruption.
//! Security posture: database contents are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use guardian_core::CapabilityKey;
use guardian_core::CapabilityStore;
use guardian_core::CapabilityStoreError;
use guardian_core::MintedIdentity;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum minted identity length accepted by the store.
pub const MAX_IDENTITY_LENGTH: usize = 512;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` capability store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default pragmas.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` capability store errors.
#[derive(Debug, Error)]
pub enum SqliteCapabilityStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored key material is malformed.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Identity already has a key.
    #[error("capability already exists: {0}")]
    Duplicate(String),
}

impl From<SqliteCapabilityStoreError> for CapabilityStoreError {
    fn from(error: SqliteCapabilityStoreError) -> Self {
        match error {
            SqliteCapabilityStoreError::Duplicate(identity) => Self::AlreadyExists(identity),
            other => Self::Store(other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed capability store with WAL support.
#[derive(Clone)]
pub struct SqliteCapabilityStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteCapabilityStore {
    /// Opens an `SQLite`-backed capability store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCapabilityStoreError`] when the database cannot be
    /// opened or initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteCapabilityStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Stores `key` for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCapabilityStoreError::Duplicate`] when the identity
    /// already has a key.
    pub fn insert_key(
        &self,
        identity: &MintedIdentity,
        key: &CapabilityKey,
    ) -> Result<(), SqliteCapabilityStoreError> {
        validate_identity(identity)?;
        let mut guard = self
            .connection
            .lock()
            .map_err(|_| SqliteCapabilityStoreError::Db("mutex poisoned".to_string()))?;
        let tx = guard.transaction().map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
        let existing: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM capability_keys WHERE identity = ?1",
                params![identity.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
        if existing.is_some() {
            return Err(SqliteCapabilityStoreError::Duplicate(identity.to_string()));
        }
        tx.execute(
            "INSERT INTO capability_keys (identity, key_bytes, created_at) VALUES (?1, ?2, ?3)",
            params![identity.as_str(), key.as_bytes().as_slice(), unix_millis()],
        )
        .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(())
    }

    /// Generates, stores, and returns a fresh key for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCapabilityStoreError::Duplicate`] when the identity
    /// already has a key.
    pub fn mint(
        &self,
        identity: &MintedIdentity,
    ) -> Result<CapabilityKey, SqliteCapabilityStoreError> {
        let key = CapabilityKey::generate();
        self.insert_key(identity, &key)?;
        Ok(key)
    }

    /// Deletes the key for `identity`, returning whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCapabilityStoreError`] when the delete fails.
    pub fn revoke(&self, identity: &MintedIdentity) -> Result<bool, SqliteCapabilityStoreError> {
        let guard = self
            .connection
            .lock()
            .map_err(|_| SqliteCapabilityStoreError::Db("mutex poisoned".to_string()))?;
        let removed = guard
            .execute("DELETE FROM capability_keys WHERE identity = ?1", params![identity.as_str()])
            .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(removed > 0)
    }

    /// Returns stored identities in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCapabilityStoreError`] when the query fails.
    pub fn identities(&self) -> Result<Vec<MintedIdentity>, SqliteCapabilityStoreError> {
        let guard = self
            .connection
            .lock()
            .map_err(|_| SqliteCapabilityStoreError::Db("mutex poisoned".to_string()))?;
        let mut statement = guard
            .prepare("SELECT identity FROM capability_keys ORDER BY identity")
            .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params![], |row| row.get::<_, String>(0))
            .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
        let mut identities = Vec::new();
        for row in rows {
            let identity = row.map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
            identities.push(MintedIdentity::new(identity));
        }
        Ok(identities)
    }

    /// Loads the key for `identity`, if any.
    fn load_key(
        &self,
        identity: &MintedIdentity,
    ) -> Result<Option<CapabilityKey>, SqliteCapabilityStoreError> {
        let bytes: Option<Vec<u8>> = {
            let guard = self
                .connection
                .lock()
                .map_err(|_| SqliteCapabilityStoreError::Db("mutex poisoned".to_string()))?;
            guard
                .query_row(
                    "SELECT key_bytes FROM capability_keys WHERE identity = ?1",
                    params![identity.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?
        };
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        CapabilityKey::from_slice(&bytes).map(Some).map_err(|err| {
            SqliteCapabilityStoreError::Corrupt(format!(
                "key for identity {}: {err}",
                identity.fingerprint()
            ))
        })
    }
}

impl CapabilityStore for SqliteCapabilityStore {
    fn capability_key(
        &self,
        identity: &MintedIdentity,
    ) -> Result<CapabilityKey, CapabilityStoreError> {
        self.load_key(identity)?.ok_or_else(|| CapabilityStoreError::NotFound(identity.to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects identities the store will not persist.
fn validate_identity(identity: &MintedIdentity) -> Result<(), SqliteCapabilityStoreError> {
    let value = identity.as_str();
    if value.trim().is_empty() {
        return Err(SqliteCapabilityStoreError::Invalid("identity must be non-empty".to_string()));
    }
    if value.len() > MAX_IDENTITY_LENGTH {
        return Err(SqliteCapabilityStoreError::Invalid(
            "identity exceeds length limit".to_string(),
        ));
    }
    Ok(())
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteCapabilityStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteCapabilityStoreError::Io(
            "store path missing parent directory".to_string(),
        ));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteCapabilityStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteCapabilityStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteCapabilityStoreError::Invalid(
            "store path exceeds length limit".to_string(),
        ));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteCapabilityStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteCapabilityStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteCapabilityStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteCapabilityStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteCapabilityStoreError> {
    let tx =
        connection.transaction().map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS capability_keys (
                    identity TEXT PRIMARY KEY,
                    key_bytes BLOB NOT NULL,
                    created_at INTEGER NOT NULL
                );",
            )
            .map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteCapabilityStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteCapabilityStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
