//! Lifecycle management for an embedded SQLite database: a single-session connection with a
//! liveness probe, versioned migrations, hot backup through SQLite's online backup API, and an
//! optional archive handoff for each finished backup.
//!
//! ```rust,no_run
//! use sqlite_lifecycle::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let migrations = MigrationSet::from_dir("./db", "migrations")?;
//! let db = SqliteConfig::builder(SqliteTarget::file("/var/lib/app", "app.db"))
//!     .migrations(migrations)
//!     .open()
//!     .await?;
//!
//! db.migrate().await?;
//! let rows = db.query("SELECT text FROM t WHERE id = ?1", &[RowValues::Int(1)]).await?;
//! assert_eq!(rows.results.len(), 1);
//!
//! db.backup(&mut CallContext::new(), &BackupTarget::new("/var/backups/app", "app.db")).await?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod backup;
pub mod config;
pub mod context;
pub mod database;
pub mod engine;
pub mod error;
pub mod migrate;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod types;

pub use archive::{ArchiveHandoff, DirectoryObjectClient, ObjectArchive, ObjectArchiveConfig};
pub use backup::{BackupFile, HotBackupEngine};
pub use config::{BackupTarget, IN_MEMORY, SqliteConfig, SqliteConfigBuilder, SqliteTarget};
pub use context::CallContext;
pub use database::SqliteDatabase;
pub use engine::{RusqliteDriver, RusqliteSession, SessionDriver, StorageSession};
pub use error::{BoxError, ErrorKind, SqlLifecycleError};
pub use migrate::{Migration, MigrationOutcome, MigrationSet};
pub use results::{CustomDbRow, ResultSet};
pub use types::RowValues;
