//! Generic SQLite record store, specialised per secret kind.
//!
//! Each kind keeps its encrypted columns under its own names in its own
//! table.  A `KindTable` marker supplies the SQL for that shape; the
//! listing and update logic is written once in `TableStore`.

use std::marker::PhantomData;

use rusqlite::{params, Connection, Row};

use super::record::{ListedRecord, RecordId, SecretKind, SecretRecord};
use super::SecretRecordStore;
use crate::errors::{StorageError, UnreadableRecord};

/// Table layout of one secret kind.
pub trait KindTable {
    const KIND: SecretKind;

    /// Must select `id, label, cipher_text, wrapped_key, iv` for every row
    /// with non-empty cipher text, ordered by id.
    const LIST_SQL: &'static str;

    /// Parameters: `?1` cipher text, `?2` wrapped key, `?3` id.
    /// Must clear the iv column in the same statement.
    const UPDATE_SQL: &'static str;
}

/// A record store over the table described by `T`.
pub struct TableStore<'c, T> {
    conn: &'c Connection,
    _table: PhantomData<T>,
}

impl<'c, T: KindTable> TableStore<'c, T> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            _table: PhantomData,
        }
    }

    pub(crate) fn conn(&self) -> &'c Connection {
        self.conn
    }
}

impl<T: KindTable> SecretRecordStore for TableStore<'_, T> {
    fn kind(&self) -> SecretKind {
        T::KIND
    }

    fn list_all_encrypted(&self) -> Result<Vec<ListedRecord>, StorageError> {
        let mut stmt = self.conn.prepare(T::LIST_SQL)?;
        let rows = stmt.query_map([], |row| listed_from_row(T::KIND, row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn update(&self, record: &SecretRecord) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            T::UPDATE_SQL,
            params![record.cipher_text, record.data_key_wrapped, record.id],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound {
                kind: T::KIND,
                id: record.id,
            });
        }
        Ok(())
    }
}

/// Map the five standard columns starting at `offset` into a record.
pub(crate) fn record_at(
    kind: SecretKind,
    row: &Row<'_>,
    offset: usize,
) -> rusqlite::Result<SecretRecord> {
    let id: RecordId = row.get(offset)?;
    let label: Option<String> = row.get(offset + 1)?;
    let cipher_text: Option<Vec<u8>> = row.get(offset + 2)?;
    let data_key_wrapped: Option<Vec<u8>> = row.get(offset + 3)?;
    let iv: Option<Vec<u8>> = row.get(offset + 4)?;

    Ok(SecretRecord {
        kind,
        id,
        label: label.unwrap_or_default(),
        cipher_text: cipher_text.unwrap_or_default(),
        data_key_wrapped: data_key_wrapped.unwrap_or_default(),
        iv: iv.unwrap_or_default(),
    })
}

/// Decode one listed row, keeping a bad row as a per-record failure.
///
/// Only an unreadable id fails the row itself.
fn listed_from_row(kind: SecretKind, row: &Row<'_>) -> rusqlite::Result<ListedRecord> {
    let id: RecordId = row.get(0)?;
    Ok(record_at(kind, row, 0).map_err(|e| UnreadableRecord {
        kind,
        id,
        reason: e.to_string(),
    }))
}
