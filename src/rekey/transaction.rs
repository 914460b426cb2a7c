//! Commit scopes around the engine's writes.
//!
//! The engine opens one scope per unit chosen by `CommitGranularity` and
//! commits it when the unit is done, or rolls it back on cancellation or
//! structural failure.  `SqliteBoundary` maps scopes onto named savepoints
//! on the connection the stores write through.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::errors::StorageError;

/// Unit of work a scope covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Run,
    Kind,
    Record,
}

impl Scope {
    fn savepoint(self) -> &'static str {
        match self {
            Self::Run => "rekey_run",
            Self::Kind => "rekey_kind",
            Self::Record => "rekey_record",
        }
    }
}

/// How much work is committed at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitGranularity {
    Run,
    #[default]
    Kind,
    Record,
}

impl CommitGranularity {
    pub fn scope(self) -> Scope {
        match self {
            Self::Run => Scope::Run,
            Self::Kind => Scope::Kind,
            Self::Record => Scope::Record,
        }
    }
}

/// Begin, commit and roll back scopes against the persistence layer.
pub trait TransactionBoundary {
    fn begin(&self, scope: Scope) -> Result<(), StorageError>;
    fn commit(&self, scope: Scope) -> Result<(), StorageError>;
    fn rollback(&self, scope: Scope) -> Result<(), StorageError>;
}

/// Savepoints on a shared SQLite connection.
pub struct SqliteBoundary<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteBoundary<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl TransactionBoundary for SqliteBoundary<'_> {
    fn begin(&self, scope: Scope) -> Result<(), StorageError> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {}", scope.savepoint()))?;
        Ok(())
    }

    fn commit(&self, scope: Scope) -> Result<(), StorageError> {
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {}", scope.savepoint()))?;
        Ok(())
    }

    fn rollback(&self, scope: Scope) -> Result<(), StorageError> {
        let name = scope.savepoint();
        self.conn
            .execute_batch(&format!("ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"))?;
        Ok(())
    }
}

/// Every write commits on its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTransaction;

impl TransactionBoundary for NoTransaction {
    fn begin(&self, _scope: Scope) -> Result<(), StorageError> {
        Ok(())
    }

    fn commit(&self, _scope: Scope) -> Result<(), StorageError> {
        Ok(())
    }

    fn rollback(&self, _scope: Scope) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn commit_keeps_writes() {
        let conn = conn();
        let boundary = SqliteBoundary::new(&conn);
        boundary.begin(Scope::Kind).unwrap();
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        boundary.commit(Scope::Kind).unwrap();
        assert_eq!(count(&conn), 1);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn rollback_discards_writes() {
        let conn = conn();
        let boundary = SqliteBoundary::new(&conn);
        boundary.begin(Scope::Run).unwrap();
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        boundary.rollback(Scope::Run).unwrap();
        assert_eq!(count(&conn), 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn nested_scopes() {
        let conn = conn();
        let boundary = SqliteBoundary::new(&conn);
        boundary.begin(Scope::Run).unwrap();
        boundary.begin(Scope::Record).unwrap();
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        boundary.commit(Scope::Record).unwrap();
        boundary.begin(Scope::Record).unwrap();
        conn.execute("INSERT INTO t VALUES (2)", []).unwrap();
        boundary.rollback(Scope::Record).unwrap();
        boundary.commit(Scope::Run).unwrap();
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn commit_without_begin_is_an_error() {
        let conn = conn();
        assert!(SqliteBoundary::new(&conn).commit(Scope::Kind).is_err());
    }

    #[test]
    fn granularity_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            commit: CommitGranularity,
        }
        let w: Wrapper = toml::from_str("commit = \"record\"").unwrap();
        assert_eq!(w.commit, CommitGranularity::Record);
        assert_eq!(CommitGranularity::default().scope(), Scope::Kind);
    }
}
