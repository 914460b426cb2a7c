//! The vault database — one SQLite file holding every secret kind plus
//! the `config` table with the master key hash.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::account::AccountStore;
use super::custom_field::{CustomFieldDataStore, DefinitionStore};
use super::history::AccountHistoryStore;
use super::MasterKeyVerifier;
use crate::crypto::kdf::Argon2Params;
use crate::crypto::keys::MasterKey;
use crate::crypto::master_hash::MasterKeyHash;
use crate::errors::{Result, StorageError, VaultPassError};

/// Current schema version, stored in `PRAGMA user_version`.
const SCHEMA_VERSION: i32 = 1;

/// Config parameters.
pub const MASTER_PWD_HASH: &str = "master_pwd_hash";
pub const MASTER_PWD_HASH_PENDING: &str = "master_pwd_hash_pending";
pub const MASTER_PWD_HASH_PREVIOUS: &str = "master_pwd_hash_previous";
pub const LAST_UPDATE_MPASS: &str = "last_update_mpass";
pub const MAINTENANCE: &str = "maintenance";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS config (
    parameter TEXT PRIMARY KEY,
    value     TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS accounts (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL UNIQUE,
    login      TEXT,
    pass       BLOB,
    pass_key   BLOB,
    pass_iv    BLOB,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS accounts_history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id  INTEGER NOT NULL,
    name        TEXT NOT NULL,
    login       TEXT,
    pass        BLOB,
    pass_key    BLOB,
    pass_iv     BLOB,
    archived_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS custom_field_definitions (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL UNIQUE,
    definition TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS custom_field_data (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    definition_id INTEGER NOT NULL,
    item_id       INTEGER NOT NULL,
    data          BLOB,
    data_key      BLOB,
    data_iv       BLOB,
    UNIQUE (definition_id, item_id)
);
";

/// Handle to an open vault database.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open (or create) the vault database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Owner-only access to the database file.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Self::from_connection(conn, path.to_path_buf())
    }

    /// Open a throwaway database that lives only in memory.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, path: PathBuf) -> Result<Self> {
        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(VaultPassError::ConfigError(format!(
                "database schema version {version} is newer than supported ({SCHEMA_VERSION})"
            )));
        }
        if version < SCHEMA_VERSION {
            conn.execute_batch(SCHEMA)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            debug!(path = %path.display(), "vault schema created");
        }
        Ok(Self { conn, path })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ------------------------------------------------------------------
    // Stores
    // ------------------------------------------------------------------

    pub fn accounts(&self) -> AccountStore<'_> {
        AccountStore::new(&self.conn)
    }

    pub fn account_history(&self) -> AccountHistoryStore<'_> {
        AccountHistoryStore::new(&self.conn)
    }

    pub fn custom_field_data(&self) -> CustomFieldDataStore<'_> {
        CustomFieldDataStore::new(&self.conn)
    }

    pub fn custom_field_definitions(&self) -> DefinitionStore<'_> {
        DefinitionStore::new(&self.conn)
    }

    // ------------------------------------------------------------------
    // Config table
    // ------------------------------------------------------------------

    pub fn config_get(&self, parameter: &str) -> std::result::Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config WHERE parameter = ?1",
                params![parameter],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn config_set(&self, parameter: &str, value: &str) -> std::result::Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO config (parameter, value) VALUES (?1, ?2)
             ON CONFLICT(parameter) DO UPDATE SET value = excluded.value",
            params![parameter, value],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Master key
    // ------------------------------------------------------------------

    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self.config_get(MASTER_PWD_HASH)?.is_some())
    }

    /// Set the first master password. Fails if one is already set.
    pub fn initialize(&self, password: &[u8], params: &Argon2Params) -> Result<MasterKey> {
        if self.is_initialized()? {
            return Err(VaultPassError::AlreadyInitialized(self.path.clone()));
        }
        let (hash, key) = MasterKeyHash::generate(password, params)?;
        self.store_master_hash(&hash)?;
        Ok(key)
    }

    pub fn master_hash(&self) -> Result<MasterKeyHash> {
        let encoded = self
            .config_get(MASTER_PWD_HASH)?
            .ok_or(VaultPassError::NotInitialized)?;
        Ok(MasterKeyHash::decode(&encoded)?)
    }

    /// Replace the stored master key hash and stamp the change time.
    pub fn store_master_hash(&self, hash: &MasterKeyHash) -> Result<()> {
        self.config_set(MASTER_PWD_HASH, &hash.encode())?;
        self.config_set(LAST_UPDATE_MPASS, &Utc::now().to_rfc3339())?;
        Ok(())
    }

    /// Hash of the key an unfinished master password change was moving
    /// records to. Records it committed are readable only under this key.
    pub fn pending_master_hash(&self) -> Result<Option<MasterKeyHash>> {
        self.config_get(MASTER_PWD_HASH_PENDING)?
            .map(|encoded| MasterKeyHash::decode(&encoded))
            .transpose()
            .map_err(Into::into)
    }

    /// Hash of the master key in use before the last completed change.
    ///
    /// Records that failed to re-key are still sealed under that key.
    pub fn previous_master_hash(&self) -> Result<Option<MasterKeyHash>> {
        self.config_get(MASTER_PWD_HASH_PREVIOUS)?
            .map(|encoded| MasterKeyHash::decode(&encoded))
            .transpose()
            .map_err(Into::into)
    }

    /// Finish a master password change: `hash` becomes the active hash, the
    /// old one is kept as the previous hash and the pending row is removed.
    pub fn promote_master_hash(&self, hash: &MasterKeyHash) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO config (parameter, value)
             SELECT ?1, value FROM config WHERE parameter = ?2
             ON CONFLICT(parameter) DO UPDATE SET value = excluded.value",
            params![MASTER_PWD_HASH_PREVIOUS, MASTER_PWD_HASH],
        )?;
        for (parameter, value) in [
            (MASTER_PWD_HASH, hash.encode()),
            (LAST_UPDATE_MPASS, Utc::now().to_rfc3339()),
        ] {
            tx.execute(
                "INSERT INTO config (parameter, value) VALUES (?1, ?2)
                 ON CONFLICT(parameter) DO UPDATE SET value = excluded.value",
                params![parameter, value],
            )?;
        }
        tx.execute(
            "DELETE FROM config WHERE parameter = ?1",
            params![MASTER_PWD_HASH_PENDING],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Drop the pending hash of a change that committed nothing.
    pub fn clear_pending_master_hash(&self) -> Result<()> {
        self.conn.execute(
            "DELETE FROM config WHERE parameter = ?1",
            params![MASTER_PWD_HASH_PENDING],
        )?;
        Ok(())
    }

    pub fn last_master_update(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .config_get(LAST_UPDATE_MPASS)?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    /// Derive and verify the master key for the normal read/write path.
    ///
    /// Refused while a master password change is in progress.
    pub fn unlock(&self, password: &[u8]) -> Result<MasterKey> {
        if self.in_maintenance()? {
            return Err(VaultPassError::MaintenanceMode);
        }
        self.master_hash()?
            .unlock(password)?
            .ok_or(VaultPassError::WrongMasterPassword)
    }

    // ------------------------------------------------------------------
    // Maintenance mode
    // ------------------------------------------------------------------

    pub fn in_maintenance(&self) -> Result<bool> {
        Ok(self.config_get(MAINTENANCE)?.as_deref() == Some("1"))
    }

    pub fn set_maintenance(&self, on: bool) -> Result<()> {
        self.config_set(MAINTENANCE, if on { "1" } else { "0" })?;
        Ok(())
    }
}

impl MasterKeyVerifier for Database {
    fn stored_hash(&self) -> std::result::Result<String, StorageError> {
        self.config_get(MASTER_PWD_HASH)?
            .ok_or_else(|| StorageError::MissingConfig(MASTER_PWD_HASH.to_string()))
    }

    fn pending_hash(&self) -> std::result::Result<Option<String>, StorageError> {
        self.config_get(MASTER_PWD_HASH_PENDING)
    }

    fn stage_pending_hash(&self, encoded: &str) -> std::result::Result<(), StorageError> {
        self.config_set(MASTER_PWD_HASH_PENDING, encoded)
    }
}
