#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sqlite_lifecycle::engine::RusqliteSession;
use sqlite_lifecycle::prelude::*;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fixture_migrations() -> Result<MigrationSet, SqlLifecycleError> {
    MigrationSet::from_dir(env!("CARGO_MANIFEST_DIR"), "tests/testmigrations")
}

/// Count rows of `table` straight from a backup file, bypassing the crate.
pub fn count_rows(path: &Path, table: &str) -> Result<i64, rusqlite::Error> {
    let conn = rusqlite::Connection::open(path)?;
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
}

/// A driver whose sessions speak SQL but never expose a native handle.
pub struct OpaqueDriver;

struct OpaqueSession(RusqliteSession);

impl StorageSession for OpaqueSession {
    fn execute_batch(&mut self, sql: &str) -> Result<(), SqlLifecycleError> {
        self.0.execute_batch(sql)
    }

    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, SqlLifecycleError> {
        self.0.execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlLifecycleError> {
        self.0.query(sql, params)
    }

    fn path(&mut self) -> Option<PathBuf> {
        self.0.path()
    }
}

impl SessionDriver for OpaqueDriver {
    fn name(&self) -> &'static str {
        "opaque"
    }

    fn open(&self, target: &SqliteTarget) -> Result<Box<dyn StorageSession>, SqlLifecycleError> {
        Ok(Box::new(OpaqueSession(RusqliteSession::open(target)?)))
    }
}

/// A driver that refuses every connection.
pub struct RefusingDriver;

impl SessionDriver for RefusingDriver {
    fn name(&self) -> &'static str {
        "refusing"
    }

    fn open(&self, target: &SqliteTarget) -> Result<Box<dyn StorageSession>, SqlLifecycleError> {
        Err(SqlLifecycleError::ConnectionError(format!(
            "refused {}",
            target.connection_string()
        )))
    }
}

/// Opens one file read-only and every other target as usual.
pub struct ReadOnlyAtDriver {
    pub read_only: PathBuf,
}

impl SessionDriver for ReadOnlyAtDriver {
    fn name(&self) -> &'static str {
        "read_only_at"
    }

    fn open(&self, target: &SqliteTarget) -> Result<Box<dyn StorageSession>, SqlLifecycleError> {
        match target {
            SqliteTarget::File { dir, db, .. } if dir.join(db) == self.read_only => Ok(Box::new(
                RusqliteSession::open(&target.clone().with_options("mode=ro"))?,
            )),
            _ => Ok(Box::new(RusqliteSession::open(target)?)),
        }
    }
}

/// Write a small standalone database with one `kept` row, standing in for an older backup.
pub fn write_previous_backup(path: &Path) -> Result<(), rusqlite::Error> {
    let conn = rusqlite::Connection::open(path)?;
    conn.execute_batch("CREATE TABLE kept (id INTEGER); INSERT INTO kept VALUES (1);")
}

/// Journal, WAL and shared-memory files next to `path` that still exist.
pub fn leftover_sidecars(path: &Path) -> Vec<PathBuf> {
    ["-journal", "-wal", "-shm"]
        .iter()
        .map(|suffix| {
            let mut name = path.as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        })
        .filter(|p| p.exists())
        .collect()
}

/// Records every handoff and the user id it saw.
#[derive(Default)]
pub struct RecordingArchive {
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<(PathBuf, Option<String>)>>,
}

impl RecordingArchive {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveHandoff for RecordingArchive {
    async fn handoff(&self, ctx: &mut CallContext, file: &mut BackupFile) -> Result<(), BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let user = ctx.user_id().ok().map(str::to_owned);
        self.seen
            .lock()
            .map_err(|e| e.to_string())?
            .push((file.path().to_path_buf(), user));
        Ok(())
    }
}

/// Fails every handoff.
#[derive(Default)]
pub struct FailingArchive {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ArchiveHandoff for FailingArchive {
    async fn handoff(&self, _ctx: &mut CallContext, _file: &mut BackupFile) -> Result<(), BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err("bucket unavailable".into())
    }
}
