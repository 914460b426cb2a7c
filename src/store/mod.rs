//! Store module — SQLite persistence for encrypted secrets.
//!
//! This module provides:
//! - `SecretRecord`, `SecretKind` and format detection (`record`)
//! - The database handle, schema and `config` table (`database`)
//! - A generic per-kind record store (`table`)
//! - The three kinds: accounts, account history, custom field data
//!   (`account`, `history`, `custom_field`)

pub mod account;
pub mod custom_field;
pub mod database;
pub mod history;
pub mod record;
pub mod table;

pub use account::{Account, AccountStore, AccountTable};
pub use custom_field::{
    CustomFieldDataStore, CustomFieldDataTable, CustomFieldDefinition, DefinitionStore, FieldType,
};
pub use database::Database;
pub use history::{AccountHistoryStore, AccountHistoryTable, HistoryEntry};
pub use record::{ListedRecord, RecordFormat, RecordId, SecretKind, SecretRecord};
pub use table::{KindTable, TableStore};

use crate::crypto::master_hash::verify_password;
use crate::errors::{StorageError, VerifyError};

/// Enumerate-and-update access to every encrypted record of one kind.
pub trait SecretRecordStore {
    fn kind(&self) -> SecretKind;

    /// Every record of this kind with non-empty cipher text, in a stable
    /// order, whatever its format.
    ///
    /// A row that cannot be decoded is listed as `Err` with its id; only a
    /// store that cannot be queried at all fails the whole listing.
    fn list_all_encrypted(&self) -> Result<Vec<ListedRecord>, StorageError>;

    /// Persist new cipher text and key material for one record atomically.
    fn update(&self, record: &SecretRecord) -> Result<(), StorageError>;
}

/// Access to the stored hash of the active master key.
pub trait MasterKeyVerifier {
    fn stored_hash(&self) -> Result<String, StorageError>;

    /// Hash of the key an unfinished master password change was moving
    /// records to, if there is one.
    fn pending_hash(&self) -> Result<Option<String>, StorageError>;

    /// Durably record the hash of the key records are about to be moved to.
    ///
    /// Called before the first record is rewritten. The write must be
    /// committed on its own, outside any commit scope of the run.
    fn stage_pending_hash(&self, encoded: &str) -> Result<(), StorageError>;

    /// Check a candidate password against the stored hash.
    fn verify(&self, password: &[u8]) -> Result<bool, VerifyError> {
        let stored = self.stored_hash()?;
        Ok(verify_password(password, &stored)?)
    }
}
