//! Archived account passwords.

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::account::parse_timestamp;
use super::record::{RecordId, SecretKind, SecretRecord};
use super::table::{record_at, KindTable, TableStore};
use crate::errors::StorageError;

/// Layout of the `accounts_history` table.
pub struct AccountHistoryTable;

impl KindTable for AccountHistoryTable {
    const KIND: SecretKind = SecretKind::AccountHistory;

    const LIST_SQL: &'static str = "SELECT id, name || ' @ ' || archived_at, pass, pass_key, pass_iv
         FROM accounts_history
         WHERE pass IS NOT NULL AND length(pass) > 0
         ORDER BY id";

    const UPDATE_SQL: &'static str =
        "UPDATE accounts_history SET pass = ?1, pass_key = ?2, pass_iv = NULL WHERE id = ?3";
}

pub type AccountHistoryStore<'c> = TableStore<'c, AccountHistoryTable>;

/// A previous version of an account.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: RecordId,
    pub account_id: RecordId,
    pub name: String,
    pub login: Option<String>,
    pub archived_at: DateTime<Utc>,
    pub secret: SecretRecord,
}

impl<'c> TableStore<'c, AccountHistoryTable> {
    /// Every archived version of one account, oldest first.
    pub fn list_for_account(&self, account_id: RecordId) -> Result<Vec<HistoryEntry>, StorageError> {
        let mut stmt = self.conn().prepare(
            "SELECT id, name, pass, pass_key, pass_iv, account_id, login, archived_at
             FROM accounts_history WHERE account_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![account_id], |row| {
            let secret = record_at(SecretKind::AccountHistory, row, 0)?;
            let archived_at: String = row.get(7)?;
            Ok(HistoryEntry {
                id: secret.id,
                account_id: row.get(5)?,
                name: secret.label.clone(),
                login: row.get(6)?,
                archived_at: parse_timestamp(&archived_at),
                secret,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::envelope::SealedSecret;
    use crate::crypto::keys::MasterKey;
    use crate::store::{Database, SecretRecordStore};

    #[test]
    fn listing_labels_name_and_archive_time() {
        let db = Database::open_in_memory().unwrap();
        let key = MasterKey::new([3u8; 32]);
        let id = db
            .accounts()
            .insert("bank", None, &SealedSecret::seal(b"v1", &key).unwrap())
            .unwrap();
        db.accounts()
            .replace_secret(id, None, &SealedSecret::seal(b"v2", &key).unwrap())
            .unwrap();

        let records = db.account_history().list_all_encrypted().unwrap();
        let records: Vec<_> = records.into_iter().map(Result::unwrap).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, SecretKind::AccountHistory);
        assert!(records[0].label.starts_with("bank @ "));
        assert_eq!(records[0].decrypt(&key).unwrap().as_slice(), b"v1");
    }

    #[test]
    fn other_accounts_history_is_not_listed() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.account_history().list_for_account(7).unwrap().is_empty());
    }
}
