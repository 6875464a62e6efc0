//! Database connection management.
//!
//! [`Storage`] owns a single [`rusqlite::Connection`] and guarantees that
//! migrations and maintenance have run before any other operation.  Open
//! one instance per database file and pass it around explicitly; there is
//! no process-wide handle.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::Connection;

use arkiv_shared::Id;

use crate::error::{Result, StoreError};
use crate::migrations;

/// Authoritative local store for archived conversations.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (or create) the default application database in the
    /// platform-appropriate data directory.
    pub fn open_default() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("org", "arkiv", "arkiv").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Self::open(&data_dir.join("archive.db"))
    }

    /// Open (or create) a database at an explicit path.
    ///
    /// Creates the schema idempotently and performs maintenance (space
    /// reclaim and statistics refresh) on every open.
    pub fn open(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "opening archive database");

        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        migrations::run_migrations(&conn)?;

        // VACUUM cannot run inside a transaction, so maintenance happens
        // after the migrations have committed.
        conn.execute_batch("VACUUM; ANALYZE;")?;

        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    ///
    /// Callers should prefer the typed CRUD helpers, but direct access is
    /// occasionally needed for ad-hoc queries.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

/// Next id for `table`, read from the sequence counter.
///
/// The counter only ever grows, so ids stay monotonic and are never reused
/// after deletions.  Must run inside the same transaction as the insert
/// that consumes the id.
pub(crate) fn next_id(conn: &Connection, table: &str) -> Result<Id> {
    let id = conn.query_row(
        "SELECT seq + 1 FROM sqlite_sequence WHERE name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let storage = Storage::open(&path).expect("should open");
        assert!(storage.path().is_some());
    }

    #[test]
    fn reopen_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        drop(Storage::open(&path).unwrap());
        let storage = Storage::open(&path).expect("second open should succeed");
        assert_eq!(next_id(storage.conn(), "collections").unwrap(), 1);
        assert_eq!(next_id(storage.conn(), "entries").unwrap(), 1);
    }
}
