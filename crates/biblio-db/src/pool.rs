//! SQLite connection handle.
//!
//! A `DbPool` is constructed once per run and passed by reference into each
//! component. Clones share the same connection; it is released when the last
//! clone is dropped.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use biblio_core::SyncError;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;
use tracing::debug;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Invalid row in '{table}' ({key}): {reason}")]
    InvalidRow {
        table: String,
        key: String,
        reason: String,
    },

    #[error("Database connection lock poisoned")]
    Poisoned,
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidRow { table, key, reason } => {
                SyncError::InvalidRecord { table, key, reason }
            }
            DbError::Connection(rusqlite::Error::SqliteFailure(code, msg))
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                SyncError::constraint("warehouse", msg.unwrap_or_else(|| code.to_string()))
            }
            other => SyncError::store(other.to_string()),
        }
    }
}

/// Shared SQLite connection.
#[derive(Clone)]
pub struct DbPool {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl DbPool {
    /// Open (creating if needed) a database file.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| DbError::Migration(format!("cannot create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)?;
        Self::configure(conn, Some(path.to_path_buf()))
    }

    /// Open an existing database file; fails when it does not exist.
    pub fn open_existing(path: &Path) -> DbResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::configure(conn, Some(path.to_path_buf()))
    }

    /// A private in-memory database.
    pub fn in_memory() -> DbResult<Self> {
        Self::configure(Connection::open_in_memory()?, None)
    }

    fn configure(conn: Connection, path: Option<PathBuf>) -> DbResult<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        debug!(path = ?path, "SQLite connection opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// File backing this pool, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` with shared access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
    {
        let conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        f(&conn)
    }

    /// Run `f` with exclusive access, for transactions and migrations.
    pub fn with_conn_mut<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&mut Connection) -> DbResult<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        f(&mut conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_existing_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.db");
        assert!(DbPool::open_existing(&missing).is_err());

        let pool = DbPool::open(&missing).unwrap();
        assert_eq!(pool.path(), Some(missing.as_path()));
        drop(pool);
        assert!(DbPool::open_existing(&missing).is_ok());
    }

    #[test]
    fn test_invalid_row_maps_to_invalid_record() {
        let err: SyncError = DbError::InvalidRow {
            table: "loan".into(),
            key: "4".into(),
            reason: "bad date".into(),
        }
        .into();
        assert!(matches!(err, SyncError::InvalidRecord { .. }));
    }
}
