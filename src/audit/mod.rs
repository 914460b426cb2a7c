//! Audit log — SQLite-based operation history.
//!
//! Records every vault write (init, set) and every re-key event in a local
//! SQLite database at `<data_dir>/audit.db`, separate from the vault.
//!
//! Designed for graceful degradation: if the database can't be opened or
//! written to, operations silently continue without logging.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::errors::{Result, VaultPassError};
use crate::rekey::events::{EventMessage, EventName, EventSink};

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    /// Secret kind the entry concerns, if any.
    pub kind: Option<String>,
    /// Account name or record id, if any.
    pub target: Option<String>,
    pub details: Option<String>,
}

/// SQLite-backed audit log.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `<data_dir>/audit.db`.
    ///
    /// Returns `None` if the database can't be opened; callers
    /// treat this as "audit logging unavailable" and continue normally.
    pub fn open(data_dir: &Path) -> Option<Self> {
        let db_path = Self::db_path(data_dir);
        let conn = Connection::open(&db_path).ok()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                operation TEXT NOT NULL,
                kind      TEXT,
                target    TEXT,
                details   TEXT
            );",
        )
        .ok()?;

        Some(Self { conn })
    }

    /// Record an operation. Errors are ignored.
    pub fn log(
        &self,
        operation: &str,
        kind: Option<&str>,
        target: Option<&str>,
        details: Option<&str>,
    ) {
        let now = Utc::now().to_rfc3339();
        let _ = self.conn.execute(
            "INSERT INTO audit_log (timestamp, operation, kind, target, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![now, operation, kind, target, details],
        );
    }

    /// Query recent audit entries, most recent first.
    ///
    /// `since` keeps only entries at or after that time.
    pub fn query(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<AuditEntry>> {
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        // An absent bound compares below every RFC 3339 timestamp.
        let since_text = since.map(|ts| ts.to_rfc3339()).unwrap_or_default();

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, operation, kind, target, details
                 FROM audit_log
                 WHERE timestamp >= ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| VaultPassError::AuditError(format!("query prepare: {e}")))?;

        let rows = stmt
            .query_map(rusqlite::params![since_text, limit_i64], |row| {
                let ts_str: String = row.get(1)?;
                let timestamp = DateTime::parse_from_rfc3339(&ts_str)
                    .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp,
                    operation: row.get(2)?,
                    kind: row.get(3)?,
                    target: row.get(4)?,
                    details: row.get(5)?,
                })
            })
            .map_err(|e| VaultPassError::AuditError(format!("query exec: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| VaultPassError::AuditError(format!("row parse: {e}")))?);
        }

        Ok(entries)
    }

    /// Return the path to the audit database (for testing/display).
    pub fn db_path(data_dir: &Path) -> PathBuf {
        data_dir.join("audit.db")
    }
}

impl EventSink for AuditLog {
    fn notify(&self, name: EventName, message: &EventMessage) {
        let details = if message.details.is_empty() {
            message.description.clone()
        } else {
            format!("{} ({})", message.description, message.details_line())
        };
        self.log(
            name.as_str(),
            message.detail("kind"),
            message.detail("id"),
            Some(&details),
        );
    }
}

/// Log one operation to the audit database in `data_dir`.
///
/// Silently does nothing when the log is disabled or unavailable; it
/// never fails the parent operation.
pub fn log_audit(
    data_dir: &Path,
    enabled: bool,
    op: &str,
    target: Option<&str>,
    details: Option<&str>,
) {
    if !enabled {
        return;
    }
    if let Some(audit) = AuditLog::open(data_dir) {
        audit.log(op, None, target, details);
    }
}
