//! Secret record types shared by every store.
//!
//! A `SecretRecord` is the encrypted part of one row of one secret kind.
//! The rest of the row (names, logins, timestamps) stays in the store.

use std::fmt;

use zeroize::Zeroizing;

use crate::crypto::envelope::{self, SealedSecret};
use crate::crypto::keys::MasterKey;
use crate::errors::{FormatError, RecordError, UnreadableRecord};

/// Identifier of a record within its kind (the SQLite row id).
pub type RecordId = i64;

/// One entry of a store listing: the record, or why its row could not be
/// read.
pub type ListedRecord = Result<SecretRecord, UnreadableRecord>;

/// The kinds of secret the vault stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SecretKind {
    CustomFieldData,
    Account,
    AccountHistory,
}

impl SecretKind {
    /// Every kind, in the order the re-key workflow processes them.
    pub const ALL: [SecretKind; 3] = [
        SecretKind::CustomFieldData,
        SecretKind::Account,
        SecretKind::AccountHistory,
    ];

    /// Stable machine name, used in events and the audit log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomFieldData => "custom_field_data",
            Self::Account => "account",
            Self::AccountHistory => "account_history",
        }
    }

    /// Human-readable name for terminal output.
    pub fn title(&self) -> &'static str {
        match self {
            Self::CustomFieldData => "Custom fields",
            Self::Account => "Accounts",
            Self::AccountHistory => "Account history",
        }
    }
}

impl fmt::Display for SecretKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a record's cipher text is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// Encrypted under a per-record data key wrapped by the master key.
    Envelope,
    /// Encrypted directly under the master key with a stored iv.
    Legacy,
}

/// The encrypted material of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub kind: SecretKind,
    pub id: RecordId,
    /// Non-secret description for logs (account name, field name).
    pub label: String,
    pub cipher_text: Vec<u8>,
    /// Empty for legacy records.
    pub data_key_wrapped: Vec<u8>,
    /// Empty for envelope records.
    pub iv: Vec<u8>,
}

impl SecretRecord {
    /// Classify the record from which key material it carries.
    pub fn format(&self) -> Result<RecordFormat, FormatError> {
        match (self.data_key_wrapped.is_empty(), self.iv.is_empty()) {
            (false, true) => Ok(RecordFormat::Envelope),
            (true, false) => Ok(RecordFormat::Legacy),
            (false, false) => Err(FormatError::AmbiguousFormat),
            (true, true) => Err(FormatError::MissingKeyMaterial),
        }
    }

    /// Decrypt the record under `master_key`, whichever format it is in.
    pub fn decrypt(&self, master_key: &MasterKey) -> Result<Zeroizing<Vec<u8>>, RecordError> {
        match self.format()? {
            RecordFormat::Envelope => {
                let data_key = envelope::unwrap_data_key(&self.data_key_wrapped, master_key)?;
                Ok(envelope::decrypt(&self.cipher_text, &data_key)?)
            }
            RecordFormat::Legacy => {
                if self.iv.len() != crate::crypto::encryption::NONCE_LEN {
                    return Err(FormatError::InvalidIv(self.iv.len()).into());
                }
                Ok(envelope::decrypt_legacy(&self.cipher_text, &self.iv, master_key)?)
            }
        }
    }

    /// The same record carrying new envelope material and no iv.
    pub fn resealed(&self, sealed: SealedSecret) -> Self {
        Self {
            kind: self.kind,
            id: self.id,
            label: self.label.clone(),
            cipher_text: sealed.cipher_text,
            data_key_wrapped: sealed.data_key_wrapped,
            iv: Vec::new(),
        }
    }
}
