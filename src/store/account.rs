//! Account passwords.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::record::{RecordId, SecretKind, SecretRecord};
use super::table::{record_at, KindTable, TableStore};
use crate::crypto::envelope::SealedSecret;
use crate::errors::StorageError;

/// Layout of the `accounts` table.
pub struct AccountTable;

impl KindTable for AccountTable {
    const KIND: SecretKind = SecretKind::Account;

    const LIST_SQL: &'static str = "SELECT id, name, pass, pass_key, pass_iv
         FROM accounts
         WHERE pass IS NOT NULL AND length(pass) > 0
         ORDER BY id";

    const UPDATE_SQL: &'static str =
        "UPDATE accounts SET pass = ?1, pass_key = ?2, pass_iv = NULL WHERE id = ?3";
}

pub type AccountStore<'c> = TableStore<'c, AccountTable>;

/// One account row.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: RecordId,
    pub name: String,
    pub login: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub secret: SecretRecord,
}

impl<'c> TableStore<'c, AccountTable> {
    /// Add a new account with an already sealed password.
    pub fn insert(
        &self,
        name: &str,
        login: Option<&str>,
        sealed: &SealedSecret,
    ) -> Result<RecordId, StorageError> {
        self.conn().execute(
            "INSERT INTO accounts (name, login, pass, pass_key, pass_iv, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            params![
                name,
                login,
                sealed.cipher_text,
                sealed.data_key_wrapped,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Account>, StorageError> {
        let account = self
            .conn()
            .query_row(
                "SELECT id, name, pass, pass_key, pass_iv, login, updated_at
                 FROM accounts WHERE name = ?1",
                params![name],
                |row| {
                    let secret = record_at(SecretKind::Account, row, 0)?;
                    let updated_at: String = row.get(6)?;
                    Ok(Account {
                        id: secret.id,
                        name: secret.label.clone(),
                        login: row.get(5)?,
                        updated_at: parse_timestamp(&updated_at),
                        secret,
                    })
                },
            )
            .optional()?;
        Ok(account)
    }

    /// Replace an account's password, archiving the previous one.
    ///
    /// The archive copy and the update commit together.
    pub fn replace_secret(
        &self,
        id: RecordId,
        login: Option<&str>,
        sealed: &SealedSecret,
    ) -> Result<(), StorageError> {
        let tx = self.conn().unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();

        let archived = tx.execute(
            "INSERT INTO accounts_history (account_id, name, login, pass, pass_key, pass_iv, archived_at)
             SELECT id, name, login, pass, pass_key, pass_iv, ?2 FROM accounts WHERE id = ?1",
            params![id, now],
        )?;
        if archived == 0 {
            return Err(StorageError::NotFound {
                kind: SecretKind::Account,
                id,
            });
        }

        tx.execute(
            "UPDATE accounts
             SET pass = ?1, pass_key = ?2, pass_iv = NULL,
                 login = COALESCE(?3, login), updated_at = ?4
             WHERE id = ?5",
            params![sealed.cipher_text, sealed.data_key_wrapped, login, now, id],
        )?;

        tx.commit()?;
        Ok(())
    }
}

pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::MasterKey;
    use crate::store::{Database, SecretRecordStore};

    fn sealed(plaintext: &[u8]) -> SealedSecret {
        SealedSecret::seal(plaintext, &MasterKey::new([1u8; 32])).unwrap()
    }

    #[test]
    fn insert_and_find() {
        let db = Database::open_in_memory().unwrap();
        let store = db.accounts();
        let id = store.insert("mail", Some("me@example.com"), &sealed(b"pw")).unwrap();

        let account = store.find_by_name("mail").unwrap().unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.login.as_deref(), Some("me@example.com"));
        assert_eq!(account.secret.kind, SecretKind::Account);
        assert!(store.find_by_name("other").unwrap().is_none());
    }

    #[test]
    fn duplicate_name_is_a_storage_error() {
        let db = Database::open_in_memory().unwrap();
        let store = db.accounts();
        store.insert("mail", None, &sealed(b"a")).unwrap();
        assert!(matches!(
            store.insert("mail", None, &sealed(b"b")),
            Err(StorageError::Database(_))
        ));
    }

    #[test]
    fn list_skips_rows_without_cipher_text() {
        let db = Database::open_in_memory().unwrap();
        let store = db.accounts();
        let a = store.insert("a", None, &sealed(b"1")).unwrap();
        db.connection()
            .execute(
                "INSERT INTO accounts (name, updated_at) VALUES ('empty', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        let c = store.insert("c", None, &sealed(b"3")).unwrap();

        let ids: Vec<_> = store
            .list_all_encrypted()
            .unwrap()
            .iter()
            .map(|r| r.as_ref().unwrap().id)
            .collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn undecodable_row_is_listed_as_unreadable() {
        let db = Database::open_in_memory().unwrap();
        let store = db.accounts();
        let a = store.insert("a", None, &sealed(b"1")).unwrap();
        let b = store.insert("b", None, &sealed(b"2")).unwrap();
        db.connection()
            .execute("UPDATE accounts SET pass = 'garbage' WHERE id = ?1", [b])
            .unwrap();

        let listed = store.list_all_encrypted().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].as_ref().unwrap().id, a);
        let unreadable = listed[1].as_ref().unwrap_err();
        assert_eq!(unreadable.kind, SecretKind::Account);
        assert_eq!(unreadable.id, b);
    }

    #[test]
    fn update_clears_iv_and_reports_missing_rows() {
        let db = Database::open_in_memory().unwrap();
        let store = db.accounts();
        let id = store.insert("a", None, &sealed(b"1")).unwrap();
        db.connection()
            .execute("UPDATE accounts SET pass_iv = x'00' WHERE id = ?1", [id])
            .unwrap();

        let mut record = store.find_by_name("a").unwrap().unwrap().secret;
        record.cipher_text = vec![4, 5, 6];
        store.update(&record).unwrap();

        let reread = store.find_by_name("a").unwrap().unwrap().secret;
        assert_eq!(reread.cipher_text, vec![4, 5, 6]);
        assert!(reread.iv.is_empty());

        record.id = 999;
        assert!(matches!(
            store.update(&record),
            Err(StorageError::NotFound { id: 999, .. })
        ));
    }

    #[test]
    fn replace_secret_archives_previous_password() {
        let db = Database::open_in_memory().unwrap();
        let store = db.accounts();
        let first = sealed(b"first");
        let id = store.insert("mail", Some("me"), &first).unwrap();

        store.replace_secret(id, None, &sealed(b"second")).unwrap();

        let history = db.account_history().list_for_account(id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].secret.cipher_text, first.cipher_text);
        assert_eq!(history[0].login.as_deref(), Some("me"));

        let account = store.find_by_name("mail").unwrap().unwrap();
        assert_ne!(account.secret.cipher_text, first.cipher_text);
        assert_eq!(account.login.as_deref(), Some("me"));
    }

    #[test]
    fn replace_secret_on_missing_account_fails() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.accounts().replace_secret(42, None, &sealed(b"x")),
            Err(StorageError::NotFound { id: 42, .. })
        ));
    }
}
