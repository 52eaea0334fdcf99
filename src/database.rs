use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{Span, debug, info};

use crate::backup::{BackupFile, HotBackupEngine};
use crate::config::{BackupTarget, SqliteConfig};
use crate::context::CallContext;
use crate::engine::StorageSession;
use crate::error::SqlLifecycleError;
use crate::migrate::{self, MigrationOutcome, MigrationSet};
use crate::pool::{SessionManager, SessionPool, build_pool, checkout, run_blocking};
use crate::results::ResultSet;
use crate::types::RowValues;

/// A managed SQLite database: one physical session, versioned migrations, hot backup, and
/// optional off-host handoff of each backup.
///
/// ```rust,no_run
/// use sqlite_lifecycle::prelude::*;
///
/// # async fn run() -> Result<(), SqlLifecycleError> {
/// let mut db = SqliteConfig::builder(SqliteTarget::InMemory).open().await?;
/// db.execute_batch("CREATE TABLE t (id INTEGER, text TEXT);").await?;
///
/// let mut ctx = CallContext::new();
/// db.backup(&mut ctx, &BackupTarget::new("/tmp/x", "backup.db")).await?;
/// db.close();
/// # Ok(())
/// # }
/// ```
pub struct SqliteDatabase {
    pool: Option<SessionPool>,
    config: SqliteConfig,
    span: Span,
}

impl SqliteDatabase {
    /// Open the configured target and probe it.
    ///
    /// For file targets the directory tree is created first; in-memory targets never touch
    /// the filesystem.
    ///
    /// # Errors
    /// Returns `DirectoryError` if the directory cannot be created and `ConnectError` if the
    /// session cannot be opened or does not answer the probe.
    pub async fn open(config: SqliteConfig) -> Result<Self, SqlLifecycleError> {
        let span = config.span.clone();
        let target = config.connection_string();
        info!(parent: &span, db = %config.target.display_name(), driver = config.driver.name(), "Connecting to SQLite");

        if let Some(dir) = config.target.dir() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| SqlLifecycleError::DirectoryError {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let manager = SessionManager::new(Arc::clone(&config.driver), config.target.clone());
        let pool = build_pool(manager, config.connection_timeout).await?;

        let probe = async {
            let session = checkout(&pool).await?;
            run_blocking(Arc::clone(&*session), |s| s.ping()).await
        };
        probe
            .await
            .map_err(|e| SqlLifecycleError::ConnectError {
                target,
                source: Box::new(e),
            })?;

        Ok(Self {
            pool: Some(pool),
            config,
            span,
        })
    }

    /// The string handed to the driver.
    #[must_use]
    pub fn connection_string(&self) -> String {
        self.config.connection_string()
    }

    #[must_use]
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pool.is_none()
    }

    /// Release the session. Closing twice is a no-op.
    ///
    /// An in-memory database is gone once its session is released.
    pub fn close(&mut self) {
        if self.pool.take().is_some() {
            debug!(parent: &self.span, "SQLite connection closed");
        }
    }

    fn pool(&self) -> Result<&SessionPool, SqlLifecycleError> {
        self.pool.as_ref().ok_or(SqlLifecycleError::Closed)
    }

    /// Run `func` against the single session on the blocking pool.
    ///
    /// # Errors
    /// Returns `Closed` after [`close`](Self::close), the checkout error, or whatever `func`
    /// returns.
    pub async fn with_session<F, R>(&self, func: F) -> Result<R, SqlLifecycleError>
    where
        F: FnOnce(&mut dyn StorageSession) -> Result<R, SqlLifecycleError> + Send + 'static,
        R: Send + 'static,
    {
        let session = checkout(self.pool()?).await?;
        run_blocking(Arc::clone(&*session), func).await
    }

    /// # Errors
    /// Returns `SqlLifecycleError` if any statement fails.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SqlLifecycleError> {
        let sql = sql.to_owned();
        self.with_session(move |s| s.execute_batch(&sql)).await
    }

    /// # Errors
    /// Returns `SqlLifecycleError` if the statement fails.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<usize, SqlLifecycleError> {
        let sql = sql.to_owned();
        let params = params.to_vec();
        self.with_session(move |s| s.execute(&sql, &params)).await
    }

    /// # Errors
    /// Returns `SqlLifecycleError` if the query fails.
    pub async fn query(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlLifecycleError> {
        let sql = sql.to_owned();
        let params = params.to_vec();
        self.with_session(move |s| s.query(&sql, &params)).await
    }

    /// Apply the configured migration set.
    ///
    /// # Errors
    /// Returns `ConfigError` if no set was configured, otherwise as
    /// [`apply_migrations`](Self::apply_migrations).
    pub async fn migrate(&self) -> Result<MigrationOutcome, SqlLifecycleError> {
        let set = self.config.migrations.clone().ok_or_else(|| {
            SqlLifecycleError::ConfigError("no migration set configured".into())
        })?;
        self.apply_migrations(&set).await
    }

    /// Apply every unapplied version of `set` in order.
    ///
    /// # Errors
    /// Returns `MigrationError` for the first failing version; earlier versions stay applied.
    pub async fn apply_migrations(
        &self,
        set: &MigrationSet,
    ) -> Result<MigrationOutcome, SqlLifecycleError> {
        let set = set.clone();
        let span = self.span.clone();
        self.with_session(move |s| migrate::apply(s, &set, &span))
            .await
            .map_err(|e| e.context("migrate"))
    }

    /// # Errors
    /// Returns `SqlLifecycleError` if the bookkeeping table cannot be read.
    pub async fn applied_versions(&self) -> Result<BTreeSet<u64>, SqlLifecycleError> {
        self.with_session(migrate::applied_versions).await
    }

    /// Hot-copy the database into `target` and return the result opened for reading.
    ///
    /// # Errors
    /// See [`HotBackupEngine::copy`].
    pub async fn copy(&self, target: &BackupTarget) -> Result<BackupFile, SqlLifecycleError> {
        let engine = HotBackupEngine::new(
            Arc::clone(&self.config.driver),
            self.config.connection_timeout,
            self.span.clone(),
        );
        engine
            .copy(self.pool()?, &self.config.target.display_name(), target)
            .await
            .map_err(|e| e.context("copy"))
    }

    /// Copy into `target`, then hand the file to the configured archive sink, if any.
    ///
    /// A failed copy never reaches the sink. A failed handoff leaves the copied file in place.
    ///
    /// # Errors
    /// Returns `Cancelled` if the context deadline passed before the copy or the handoff
    /// started, any [`copy`](Self::copy) error, or `UploadError` wrapping the sink's error.
    pub async fn backup(
        &self,
        ctx: &mut CallContext,
        target: &BackupTarget,
    ) -> Result<(), SqlLifecycleError> {
        ctx.ensure_live("backup")?;
        let mut file = self.copy(target).await.map_err(|e| e.context("backup"))?;

        let Some(archive) = self.config.archive.as_ref() else {
            info!(parent: &self.span, "No archive handoff configured, skipping remote database backup.");
            return Ok(());
        };

        file.rewind()?;
        ctx.ensure_live("archive handoff")?;
        archive
            .handoff(ctx, &mut file)
            .await
            .map_err(|source| SqlLifecycleError::UploadError {
                file: file.path().to_path_buf(),
                source,
            })
            .map_err(|e| e.context("backup"))
    }
}

impl fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
