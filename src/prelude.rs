//! Convenient imports for common functionality.

pub use crate::archive::{
    ArchiveHandoff, DirectoryObjectClient, ObjectArchive, ObjectArchiveConfig, ObjectClient,
    PutObject,
};
pub use crate::backup::BackupFile;
pub use crate::config::{BackupTarget, IN_MEMORY, SqliteConfig, SqliteTarget};
pub use crate::context::CallContext;
pub use crate::database::SqliteDatabase;
pub use crate::engine::{SessionDriver, StorageSession};
pub use crate::error::{BoxError, ErrorKind, SqlLifecycleError};
pub use crate::migrate::{Migration, MigrationOutcome, MigrationSet};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::types::RowValues;
