use std::path::PathBuf;

use thiserror::Error;

use crate::crypto::master_hash::MasterKeyHash;
use crate::rekey::report::ReKeyReport;
use crate::store::record::{RecordId, SecretKind};

/// Failures of the cryptographic primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("authentication failed: wrong key or tampered data")]
    AuthenticationFailed,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("master key hash is not in a recognised format")]
    MalformedHash,

    #[error("master key hash is corrupt: {0}")]
    CorruptHash(String),

    #[error("invalid key length: {0} bytes")]
    InvalidKeyLength(usize),
}

/// A record whose stored key material does not describe a usable format.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("record has cipher text but neither a wrapped data key nor an iv")]
    MissingKeyMaterial,

    #[error("record carries both a wrapped data key and an iv")]
    AmbiguousFormat,

    #[error("legacy iv must be 12 bytes, got {0}")]
    InvalidIv(usize),
}

/// Persistence failures reported by the record stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{kind} record {id} not found")]
    NotFound { kind: SecretKind, id: RecordId },

    #[error("configuration value '{0}' is missing")]
    MissingConfig(String),
}

/// A listed row whose id is known but whose other columns could not be read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} record {id} could not be read: {reason}")]
pub struct UnreadableRecord {
    pub kind: SecretKind,
    pub id: RecordId,
    pub reason: String,
}

/// Failure to check a password, as opposed to a password that does not match.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Why a single record could not be re-keyed. Always recovered locally.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Unreadable(#[from] UnreadableRecord),
}

/// Conditions that end a re-key run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("the current master password is wrong")]
    WrongCurrentPassword,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// An earlier change staged a different new master key and did not finish.
    #[error("an unfinished master password change exists; re-run it with the same new password")]
    PendingChange,

    /// `new_master_hash` is set once the new key exists; records already
    /// committed are readable only under it.
    #[error("re-key aborted: {reason}")]
    Aborted {
        reason: String,
        report: ReKeyReport,
        new_master_hash: Option<MasterKeyHash>,
    },

    #[error("re-key cancelled")]
    Cancelled {
        report: ReKeyReport,
        new_master_hash: MasterKeyHash,
    },
}

impl EngineError {
    /// The partial report, for the variants that carry one.
    pub fn report(&self) -> Option<&ReKeyReport> {
        match self {
            Self::Aborted { report, .. } | Self::Cancelled { report, .. } => Some(report),
            Self::WrongCurrentPassword | Self::Crypto(_) | Self::PendingChange => None,
        }
    }

    /// The new master hash of an interrupted run that got past key generation.
    pub fn new_master_hash(&self) -> Option<&MasterKeyHash> {
        match self {
            Self::Aborted {
                new_master_hash, ..
            } => new_master_hash.as_ref(),
            Self::Cancelled {
                new_master_hash, ..
            } => Some(new_master_hash),
            Self::WrongCurrentPassword | Self::Crypto(_) | Self::PendingChange => None,
        }
    }
}

/// All errors that can occur in VaultPass.
#[derive(Debug, Error)]
pub enum VaultPassError {
    // --- Crypto / engine errors ---
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Wrong master password")]
    WrongMasterPassword,

    #[error("Re-key finished with {failed} failed record(s) ({updated} updated) — check the audit log")]
    PartialRekey { updated: usize, failed: usize },

    // --- Vault errors ---
    #[error("Vault at {0} is already initialized")]
    AlreadyInitialized(PathBuf),

    #[error("Vault is not initialized — run `vaultpass init` first")]
    NotInitialized,

    #[error("Vault is in maintenance mode — a master password change is in progress")]
    MaintenanceMode,

    #[error("Account '{0}' not found")]
    AccountNotFound(String),

    #[error("Custom field '{0}' not found")]
    FieldNotFound(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Audit error: {0}")]
    AuditError(String),
}

impl From<rusqlite::Error> for VaultPassError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(e))
    }
}

/// Convenience type alias for VaultPass results.
pub type Result<T> = std::result::Result<T, VaultPassError>;
