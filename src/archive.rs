// Off-host handoff of finished backups.
//
// - object: object-store sink keyed by instance id and file name
// - directory: an object client that stores objects on a local filesystem

pub mod directory;
pub mod object;

use async_trait::async_trait;

pub use directory::DirectoryObjectClient;
pub use object::{ObjectArchive, ObjectArchiveConfig, ObjectClient, PutObject};

use crate::backup::BackupFile;
use crate::context::CallContext;
use crate::error::BoxError;

/// Receives a finished backup after a successful copy.
///
/// `file` is readable and positioned at the start. It stays owned by the caller and must not
/// be assumed valid after `handoff` returns. Any error is reported to the backup caller as
/// `UploadError`.
#[async_trait]
pub trait ArchiveHandoff: Send + Sync {
    async fn handoff(&self, ctx: &mut CallContext, file: &mut BackupFile) -> Result<(), BoxError>;
}
