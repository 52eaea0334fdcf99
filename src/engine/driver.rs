use std::fmt;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use super::params::Params;
use super::query::build_result_set;
use super::{SessionDriver, StorageSession};
use crate::config::SqliteTarget;
use crate::error::SqlLifecycleError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Default driver: every session is a plain `rusqlite::Connection`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RusqliteDriver;

impl SessionDriver for RusqliteDriver {
    fn name(&self) -> &'static str {
        "rusqlite"
    }

    fn open(&self, target: &SqliteTarget) -> Result<Box<dyn StorageSession>, SqlLifecycleError> {
        Ok(Box::new(RusqliteSession::open(target)?))
    }
}

/// A `rusqlite::Connection` exposed through [`StorageSession`], native handle included.
pub struct RusqliteSession {
    conn: Connection,
}

impl RusqliteSession {
    /// Open a session for `target`.
    ///
    /// In-memory targets open a private in-memory database. A file target without options
    /// opens its path directly; with options it is opened as the URI `file:<path>?<options>`
    /// so the options reach SQLite.
    ///
    /// # Errors
    /// Returns `SqlLifecycleError::SqliteError` if SQLite cannot open the database.
    pub fn open(target: &SqliteTarget) -> Result<Self, SqlLifecycleError> {
        let conn = match target {
            SqliteTarget::InMemory => Connection::open_in_memory()?,
            SqliteTarget::File { dir, db, options } if options.is_empty() => {
                Connection::open(dir.join(db))?
            }
            SqliteTarget::File { dir, db, options } => Connection::open_with_flags(
                format!("file:{}?{options}", uri_path(&dir.join(db))),
                OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI,
            )?,
        };
        Ok(Self { conn })
    }
}

/// Escape the characters that would end or corrupt the path part of a `file:` URI.
fn uri_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '?' => out.push_str("%3F"),
            '#' => out.push_str("%23"),
            _ => out.push(ch),
        }
    }
    out
}

impl StorageSession for RusqliteSession {
    fn execute_batch(&mut self, sql: &str) -> Result<(), SqlLifecycleError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, SqlLifecycleError> {
        let converted = Params::convert(params);
        let mut stmt = self.conn.prepare(sql)?;
        Ok(stmt.execute(&converted.as_refs()[..])?)
    }

    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlLifecycleError> {
        let converted = Params::convert(params);
        let mut stmt = self.conn.prepare(sql)?;
        build_result_set(&mut stmt, converted.as_values())
    }

    fn path(&mut self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    fn native_handle(&mut self) -> Option<&mut Connection> {
        Some(&mut self.conn)
    }
}

impl fmt::Debug for RusqliteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RusqliteSession")
            .field("path", &self.conn.path())
            .finish()
    }
}
