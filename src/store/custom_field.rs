//! Custom fields attached to accounts.
//!
//! A definition describes a field (name, type, help text) and is stored as
//! JSON tagged with an explicit `"version"`.  Older versions decode into
//! the current `CustomFieldDefinition`; new rows are always written as the
//! latest version.  Field values live in `custom_field_data` and are
//! always encrypted.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::record::{RecordId, SecretKind, SecretRecord};
use super::table::{record_at, KindTable, TableStore};
use crate::crypto::envelope::SealedSecret;
use crate::errors::{Result, StorageError, VaultPassError};

/// Layout of the `custom_field_data` table.
pub struct CustomFieldDataTable;

impl KindTable for CustomFieldDataTable {
    const KIND: SecretKind = SecretKind::CustomFieldData;

    const LIST_SQL: &'static str = "SELECT d.id,
                COALESCE(f.name, 'field ' || d.definition_id) || ' #' || d.item_id,
                d.data, d.data_key, d.data_iv
         FROM custom_field_data d
         LEFT JOIN custom_field_definitions f ON f.id = d.definition_id
         WHERE d.data IS NOT NULL AND length(d.data) > 0
         ORDER BY d.id";

    const UPDATE_SQL: &'static str =
        "UPDATE custom_field_data SET data = ?1, data_key = ?2, data_iv = NULL WHERE id = ?3";
}

pub type CustomFieldDataStore<'c> = TableStore<'c, CustomFieldDataTable>;

impl<'c> TableStore<'c, CustomFieldDataTable> {
    /// Insert or replace the value of one field on one item.
    pub fn set_value(
        &self,
        definition_id: RecordId,
        item_id: RecordId,
        sealed: &SealedSecret,
    ) -> std::result::Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO custom_field_data (definition_id, item_id, data, data_key, data_iv)
             VALUES (?1, ?2, ?3, ?4, NULL)
             ON CONFLICT(definition_id, item_id) DO UPDATE
             SET data = excluded.data, data_key = excluded.data_key, data_iv = NULL",
            params![definition_id, item_id, sealed.cipher_text, sealed.data_key_wrapped],
        )?;
        Ok(())
    }

    pub fn get_value(
        &self,
        definition_id: RecordId,
        item_id: RecordId,
    ) -> std::result::Result<Option<SecretRecord>, StorageError> {
        let record = self
            .conn()
            .query_row(
                "SELECT id, NULL, data, data_key, data_iv FROM custom_field_data
                 WHERE definition_id = ?1 AND item_id = ?2",
                params![definition_id, item_id],
                |row| record_at(SecretKind::CustomFieldData, row, 0),
            )
            .optional()?;
        Ok(record)
    }
}

/// Input widget of a custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Password,
    Email,
    Url,
    Number,
    Textarea,
}

/// A custom field definition, whatever version it was stored as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomFieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub help: Option<String>,
    pub show_in_list: bool,
}

impl CustomFieldDefinition {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            required: false,
            help: None,
            show_in_list: false,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let stored = StoredDefinition::V2 {
            name: self.name.clone(),
            field_type: self.field_type,
            required: self.required,
            help: self.help.clone(),
            show_in_list: self.show_in_list,
        };
        serde_json::to_string(&stored)
            .map_err(|e| VaultPassError::SerializationError(format!("field definition: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let stored: StoredDefinition = serde_json::from_str(json)
            .map_err(|e| VaultPassError::SerializationError(format!("field definition: {e}")))?;
        Ok(stored.into())
    }
}

/// On-disk shapes of a definition.
#[derive(Serialize, Deserialize)]
#[serde(tag = "version")]
enum StoredDefinition {
    #[serde(rename = "1")]
    V1 {
        name: String,
        field_type: FieldType,
        #[serde(default)]
        required: bool,
    },
    #[serde(rename = "2")]
    V2 {
        name: String,
        field_type: FieldType,
        #[serde(default)]
        required: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        help: Option<String>,
        #[serde(default)]
        show_in_list: bool,
    },
}

impl From<StoredDefinition> for CustomFieldDefinition {
    fn from(stored: StoredDefinition) -> Self {
        match stored {
            StoredDefinition::V1 {
                name,
                field_type,
                required,
            } => Self {
                name,
                field_type,
                required,
                help: None,
                show_in_list: false,
            },
            StoredDefinition::V2 {
                name,
                field_type,
                required,
                help,
                show_in_list,
            } => Self {
                name,
                field_type,
                required,
                help,
                show_in_list,
            },
        }
    }
}

/// Access to `custom_field_definitions`.
pub struct DefinitionStore<'c> {
    conn: &'c Connection,
}

impl<'c> DefinitionStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn define(&self, definition: &CustomFieldDefinition) -> Result<RecordId> {
        self.conn.execute(
            "INSERT INTO custom_field_definitions (name, definition) VALUES (?1, ?2)",
            params![definition.name, definition.to_json()?],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_definition(&self, name: &str) -> Result<Option<(RecordId, CustomFieldDefinition)>> {
        let row: Option<(RecordId, String)> = self
            .conn
            .query_row(
                "SELECT id, definition FROM custom_field_definitions WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((id, json)) => Ok(Some((id, CustomFieldDefinition::from_json(&json)?))),
            None => Ok(None),
        }
    }
}
