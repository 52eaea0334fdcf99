use std::path::PathBuf;

use thiserror::Error;

/// Boxed error used at collaborator seams (archive sinks, connection probes).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum SqlLifecycleError {
    #[error("failed to create database directory {}: {source}", path.display())]
    DirectoryError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to {target}: {source}")]
    ConnectError {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("migration {version} ({name}) failed: {source}")]
    MigrationError {
        version: u64,
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("{side} session from driver `{driver}` does not expose a native SQLite handle")]
    NativeHandleError {
        side: &'static str,
        driver: &'static str,
    },

    #[error("backup step failed: {reason}")]
    BackupStepError {
        reason: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("backup finalize failed: {reason}")]
    BackupFinalizeError {
        reason: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("archive handoff of {} failed: {source}", file.display())]
    UploadError {
        file: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("I/O error on {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("call context value not set: {0}")]
    ContextValueNotSet(&'static str),

    #[error("{0}: call context deadline passed before the operation started")]
    Cancelled(&'static str),

    #[error("database connection is closed")]
    Closed,

    #[error("{op}: {source}")]
    Context {
        op: &'static str,
        #[source]
        source: Box<SqlLifecycleError>,
    },
}

/// Coarse classification of [`SqlLifecycleError`], stable across call-site wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Directory,
    Connect,
    Migration,
    NativeHandle,
    BackupStep,
    BackupFinalize,
    Upload,
    Sqlite,
    Config,
    Connection,
    Execution,
    Io,
    ContextValueNotSet,
    Cancelled,
    Closed,
}

impl SqlLifecycleError {
    /// Wrap `self` with the name of the operation that observed it.
    #[must_use]
    pub fn context(self, op: &'static str) -> Self {
        SqlLifecycleError::Context {
            op,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any call-site wrappers.
    #[must_use]
    pub fn root(&self) -> &SqlLifecycleError {
        let mut current = self;
        while let SqlLifecycleError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            SqlLifecycleError::DirectoryError { .. } => ErrorKind::Directory,
            SqlLifecycleError::ConnectError { .. } => ErrorKind::Connect,
            SqlLifecycleError::MigrationError { .. } => ErrorKind::Migration,
            SqlLifecycleError::NativeHandleError { .. } => ErrorKind::NativeHandle,
            SqlLifecycleError::BackupStepError { .. } => ErrorKind::BackupStep,
            SqlLifecycleError::BackupFinalizeError { .. } => ErrorKind::BackupFinalize,
            SqlLifecycleError::UploadError { .. } => ErrorKind::Upload,
            SqlLifecycleError::SqliteError(_) => ErrorKind::Sqlite,
            SqlLifecycleError::ConfigError(_) => ErrorKind::Config,
            SqlLifecycleError::ConnectionError(_) => ErrorKind::Connection,
            SqlLifecycleError::ExecutionError(_) => ErrorKind::Execution,
            SqlLifecycleError::IoError { .. } => ErrorKind::Io,
            SqlLifecycleError::ContextValueNotSet(_) => ErrorKind::ContextValueNotSet,
            SqlLifecycleError::Cancelled(_) => ErrorKind::Cancelled,
            SqlLifecycleError::Closed => ErrorKind::Closed,
            // root() never returns a Context
            SqlLifecycleError::Context { .. } => ErrorKind::Execution,
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// Configuration faults (a driver without a native handle, an unusable directory, a bad
    /// migration set or script) fail the same way every time.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::NativeHandle
                | ErrorKind::Directory
                | ErrorKind::Config
                | ErrorKind::Migration
                | ErrorKind::Closed
        )
    }
}

impl From<bb8::RunError<SqlLifecycleError>> for SqlLifecycleError {
    fn from(err: bb8::RunError<SqlLifecycleError>) -> Self {
        match err {
            bb8::RunError::User(inner) => inner,
            bb8::RunError::TimedOut => {
                SqlLifecycleError::ConnectionError("sqlite checkout timed out".into())
            }
        }
    }
}
