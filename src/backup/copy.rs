use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode};
use rusqlite::backup::{Backup, StepResult};
use tracing::{Span, debug, info, warn};

use super::BackupFile;
use crate::config::BackupTarget;
use crate::engine::{SessionDriver, StorageSession};
use crate::error::SqlLifecycleError;
use crate::pool::{SessionManager, SessionPool, build_pool, checkout, run_blocking, run_blocking_pair};

/// Files SQLite may leave next to a database.
const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Copies a live database into a standalone file with SQLite's online backup API.
///
/// The destination is opened through its own single-session pool that lives only for one
/// [`copy`](HotBackupEngine::copy) call.
#[derive(Clone)]
pub struct HotBackupEngine {
    driver: Arc<dyn SessionDriver>,
    connection_timeout: Duration,
    span: Span,
}

impl HotBackupEngine {
    #[must_use]
    pub fn new(driver: Arc<dyn SessionDriver>, connection_timeout: Duration, span: Span) -> Self {
        Self {
            driver,
            connection_timeout,
            span,
        }
    }

    /// Copy every page of `source` into `target` and return the result opened for reading.
    ///
    /// All pages are copied in a single step while the source checkout is held, so other
    /// callers wait on the pool instead of touching the source session mid-copy. Writes
    /// issued before the checkout is granted are included; later ones are not.
    ///
    /// A `target` that resolves to the source's own file is refused before any destination
    /// session is opened. On failure the destination file and its journal/WAL sidecars are
    /// deleted only if this call created the file or wrote pages into it; a file that was
    /// already there and never touched is left alone.
    ///
    /// # Errors
    /// - `DirectoryError` if the destination directory cannot be created or resolved
    /// - `ConfigError` if the destination is the source database itself
    /// - `ConnectError` if the destination cannot be opened
    /// - `NativeHandleError` if either session lacks a native SQLite handle
    /// - `BackupStepError` / `BackupFinalizeError` if the native copy fails
    /// - `IoError` if the finished file cannot be opened for reading
    pub async fn copy(
        &self,
        source: &SessionPool,
        source_name: &str,
        target: &BackupTarget,
    ) -> Result<BackupFile, SqlLifecycleError> {
        let planned = target.path();
        info!(parent: &self.span, from = source_name, to = %planned.display(), "Copying SQLite");

        tokio::fs::create_dir_all(&target.dir)
            .await
            .map_err(|source| SqlLifecycleError::DirectoryError {
                path: target.dir.clone(),
                source,
            })?;
        self.ensure_distinct(source, target).await?;

        // an unreadable answer counts as existing, so it is never deleted
        let existed = tokio::fs::try_exists(&planned).await.unwrap_or(true);

        match self.copy_into(source, target).await {
            Ok(file) => {
                info!(parent: &self.span, to = %file.path().display(), "SQLite dump complete.");
                Ok(file)
            }
            Err(failure) => {
                if failure.wrote || !existed {
                    remove_partial(&planned, &self.span).await;
                } else {
                    debug!(parent: &self.span, path = %planned.display(), "Destination left as it was");
                }
                Err(failure.error)
            }
        }
    }

    /// Refuse a destination that is the file backing `source`.
    async fn ensure_distinct(
        &self,
        source: &SessionPool,
        target: &BackupTarget,
    ) -> Result<(), SqlLifecycleError> {
        let session = checkout(source).await?;
        let source_path = run_blocking(Arc::clone(&*session), |s| Ok(s.path())).await?;
        drop(session);

        let Some(source_path) = source_path else {
            return Ok(());
        };
        let live = tokio::fs::canonicalize(&source_path)
            .await
            .unwrap_or(source_path);
        let planned = resolve_planned(target).await?;
        if live == planned {
            return Err(SqlLifecycleError::ConfigError(format!(
                "backup destination {} is the live database",
                planned.display()
            )));
        }
        Ok(())
    }

    async fn copy_into(
        &self,
        source: &SessionPool,
        target: &BackupTarget,
    ) -> Result<BackupFile, CopyFailure> {
        let manager = SessionManager::new(Arc::clone(&self.driver), target.sqlite_target());
        let destination = build_pool(manager, self.connection_timeout)
            .await
            .map_err(CopyFailure::untouched)?;

        let copied = self.copy_pages(source, &destination).await;
        drop(destination);

        BackupFile::open(copied?)
            .await
            .map_err(CopyFailure::written)
    }

    async fn copy_pages(
        &self,
        source: &SessionPool,
        destination: &SessionPool,
    ) -> Result<PathBuf, CopyFailure> {
        let src = checkout(source).await.map_err(CopyFailure::untouched)?;
        let dst = checkout(destination)
            .await
            .map_err(CopyFailure::untouched)?;
        let driver = self.driver.name();
        let span = self.span.clone();

        let copied = run_blocking_pair(Arc::clone(&*src), Arc::clone(&*dst), move |src, dst| {
            Ok(copy_all_pages(src, dst, driver, &span))
        })
        .await;

        drop(dst);
        drop(src);
        // a panicked task may have stepped already
        copied.map_err(CopyFailure::written)?
    }
}

/// Canonical destination path; the directory already exists, the file may not.
async fn resolve_planned(target: &BackupTarget) -> Result<PathBuf, SqlLifecycleError> {
    if let Ok(existing) = tokio::fs::canonicalize(target.path()).await {
        return Ok(existing);
    }
    let dir = tokio::fs::canonicalize(&target.dir)
        .await
        .map_err(|source| SqlLifecycleError::DirectoryError {
            path: target.dir.clone(),
            source,
        })?;
    Ok(dir.join(&target.name))
}

/// A failed copy, and whether the destination file may hold pages written by it.
#[derive(Debug)]
struct CopyFailure {
    error: SqlLifecycleError,
    wrote: bool,
}

impl CopyFailure {
    fn untouched(error: SqlLifecycleError) -> Self {
        Self {
            error,
            wrote: false,
        }
    }

    fn written(error: SqlLifecycleError) -> Self {
        Self { error, wrote: true }
    }
}

impl std::fmt::Debug for HotBackupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotBackupEngine")
            .field("driver", &self.driver.name())
            .field("connection_timeout", &self.connection_timeout)
            .finish_non_exhaustive()
    }
}

fn copy_all_pages(
    source: &mut dyn StorageSession,
    destination: &mut dyn StorageSession,
    driver: &'static str,
    span: &Span,
) -> Result<PathBuf, CopyFailure> {
    let src = source.native_handle().ok_or_else(|| {
        CopyFailure::untouched(SqlLifecycleError::NativeHandleError {
            side: "source",
            driver,
        })
    })?;
    let dst = destination.native_handle().ok_or_else(|| {
        CopyFailure::untouched(SqlLifecycleError::NativeHandleError {
            side: "destination",
            driver,
        })
    })?;

    step_all(src, dst)?;
    debug!(parent: span, "backup step done");
    verify_destination(dst).map_err(CopyFailure::written)?;

    // the engine may have normalized the name it was given
    destination.path().ok_or_else(|| {
        CopyFailure::written(SqlLifecycleError::BackupFinalizeError {
            reason: "destination session reports no backing file".into(),
            source: None,
        })
    })
}

/// Copy all remaining pages in one call, then finish the backup object.
fn step_all(src: &Connection, dst: &mut Connection) -> Result<(), CopyFailure> {
    let backup = Backup::new(src, dst).map_err(|e| {
        CopyFailure::untouched(SqlLifecycleError::BackupStepError {
            reason: "could not start backup".into(),
            source: Some(e),
        })
    })?;

    match backup.step(-1) {
        Ok(StepResult::Done) => Ok(()),
        Ok(StepResult::More) => Err(CopyFailure::written(SqlLifecycleError::BackupStepError {
            reason: "step(-1) did not finish: More".into(),
            source: None,
        })),
        Ok(other) => Err(CopyFailure::untouched(SqlLifecycleError::BackupStepError {
            reason: format!("step(-1) did not finish: {other:?}"),
            source: None,
        })),
        Err(e) => {
            let wrote = !refused_before_writing(&e);
            Err(CopyFailure {
                error: SqlLifecycleError::BackupStepError {
                    reason: "step(-1) failed".into(),
                    source: Some(e),
                },
                wrote,
            })
        }
    }
}

/// Errors SQLite raises while acquiring the destination write lock, before any page lands.
fn refused_before_writing(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::ReadOnly | ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// The backup handle swallows its finish status on drop, so check what actually landed.
fn verify_destination(dst: &Connection) -> Result<(), SqlLifecycleError> {
    let status: String = dst
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .map_err(|e| SqlLifecycleError::BackupFinalizeError {
            reason: "quick_check on destination failed".into(),
            source: Some(e),
        })?;
    if status == "ok" {
        Ok(())
    } else {
        Err(SqlLifecycleError::BackupFinalizeError {
            reason: format!("destination failed quick_check: {status}"),
            source: None,
        })
    }
}

async fn remove_partial(path: &Path, span: &Span) {
    let mut candidates = vec![path.to_path_buf()];
    candidates.extend(SIDECAR_SUFFIXES.iter().map(|suffix| {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }));

    for candidate in candidates {
        match tokio::fs::remove_file(&candidate).await {
            Ok(()) => {
                warn!(parent: span, path = %candidate.display(), "Removed partial backup file");
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => {
                warn!(parent: span, path = %candidate.display(), error = %e, "Could not remove partial backup file");
            }
        }
    }
}
