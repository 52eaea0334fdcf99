use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Span;

use crate::archive::ArchiveHandoff;
use crate::database::SqliteDatabase;
use crate::engine::{RusqliteDriver, SessionDriver};
use crate::error::SqlLifecycleError;
use crate::migrate::MigrationSet;

/// In-memory marker. Used as a directory it makes the file name and options irrelevant.
pub const IN_MEMORY: &str = ":memory:";

/// How long a caller waits for the single physical session before giving up.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the managed database lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SqliteTarget {
    InMemory,
    File {
        dir: PathBuf,
        db: String,
        #[serde(default)]
        options: String,
    },
}

impl SqliteTarget {
    #[must_use]
    pub fn file(dir: impl Into<PathBuf>, db: impl Into<String>) -> Self {
        SqliteTarget::File {
            dir: dir.into(),
            db: db.into(),
            options: String::new(),
        }
    }

    /// Build a target from loose parts; a `dir` equal to [`IN_MEMORY`] wins over everything else.
    #[must_use]
    pub fn from_parts(dir: &str, db: &str, options: &str) -> Self {
        if dir == IN_MEMORY {
            SqliteTarget::InMemory
        } else {
            SqliteTarget::File {
                dir: PathBuf::from(dir),
                db: db.to_owned(),
                options: options.to_owned(),
            }
        }
    }

    #[must_use]
    pub fn with_options(self, options: impl Into<String>) -> Self {
        match self {
            SqliteTarget::InMemory => SqliteTarget::InMemory,
            SqliteTarget::File { dir, db, .. } => SqliteTarget::File {
                dir,
                db,
                options: options.into(),
            },
        }
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        matches!(self, SqliteTarget::InMemory)
    }

    /// Directory that must exist before opening, if any.
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        match self {
            SqliteTarget::InMemory => None,
            SqliteTarget::File { dir, .. } => Some(dir),
        }
    }

    /// Resolve to the single string handed to the driver.
    ///
    /// ```rust
    /// use sqlite_lifecycle::config::SqliteTarget;
    ///
    /// let target = SqliteTarget::from_parts("/foo/bar/", "test.db", "cache=shared");
    /// assert_eq!(target.connection_string(), "/foo/bar/test.db?cache=shared");
    /// ```
    #[must_use]
    pub fn connection_string(&self) -> String {
        match self {
            SqliteTarget::InMemory => IN_MEMORY.to_owned(),
            SqliteTarget::File { dir, db, options } => {
                format!("{}?{options}", dir.join(db).display())
            }
        }
    }

    /// Connection string without options, for logs.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            SqliteTarget::InMemory => IN_MEMORY.to_owned(),
            SqliteTarget::File { dir, db, .. } => dir.join(db).display().to_string(),
        }
    }
}

/// Destination of a hot backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupTarget {
    pub dir: PathBuf,
    pub name: String,
}

impl BackupTarget {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    #[must_use]
    pub fn connection_string(&self) -> String {
        self.path().display().to_string()
    }

    /// The destination as an option-less file target.
    #[must_use]
    pub fn sqlite_target(&self) -> SqliteTarget {
        SqliteTarget::file(self.dir.clone(), self.name.clone())
    }
}

/// Everything needed to open and run a [`SqliteDatabase`].
#[derive(Clone)]
pub struct SqliteConfig {
    pub target: SqliteTarget,
    pub migrations: Option<MigrationSet>,
    pub archive: Option<Arc<dyn ArchiveHandoff>>,
    pub driver: Arc<dyn SessionDriver>,
    pub connection_timeout: Duration,
    pub span: Span,
}

impl SqliteConfig {
    #[must_use]
    pub fn new(target: SqliteTarget) -> Self {
        let span = tracing::info_span!("sqlite", db = %target.display_name());
        Self {
            target,
            migrations: None,
            archive: None,
            driver: Arc::new(RusqliteDriver),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            span,
        }
    }

    #[must_use]
    pub fn builder(target: SqliteTarget) -> SqliteConfigBuilder {
        SqliteConfigBuilder::new(target)
    }

    #[must_use]
    pub fn connection_string(&self) -> String {
        self.target.connection_string()
    }
}

impl fmt::Debug for SqliteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConfig")
            .field("target", &self.target)
            .field("migrations", &self.migrations.as_ref().map(MigrationSet::len))
            .field("archive", &self.archive.is_some())
            .field("driver", &self.driver.name())
            .field("connection_timeout", &self.connection_timeout)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`SqliteConfig`].
#[derive(Debug, Clone)]
pub struct SqliteConfigBuilder {
    config: SqliteConfig,
}

impl SqliteConfigBuilder {
    #[must_use]
    pub fn new(target: SqliteTarget) -> Self {
        Self {
            config: SqliteConfig::new(target),
        }
    }

    #[must_use]
    pub fn migrations(mut self, migrations: MigrationSet) -> Self {
        self.config.migrations = Some(migrations);
        self
    }

    #[must_use]
    pub fn archive(mut self, archive: Arc<dyn ArchiveHandoff>) -> Self {
        self.config.archive = Some(archive);
        self
    }

    #[must_use]
    pub fn driver(mut self, driver: Arc<dyn SessionDriver>) -> Self {
        self.config.driver = driver;
        self
    }

    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Parent span for every event the database emits.
    #[must_use]
    pub fn span(mut self, span: Span) -> Self {
        self.config.span = span;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteConfig {
        self.config
    }

    /// Open a [`SqliteDatabase`] from the built configuration.
    ///
    /// # Errors
    ///
    /// Returns `SqlLifecycleError` if the directory cannot be created or the connection probe fails.
    pub async fn open(self) -> Result<SqliteDatabase, SqlLifecycleError> {
        SqliteDatabase::open(self.finish()).await
    }
}
