use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{Span, info};

use super::ArchiveHandoff;
use crate::backup::BackupFile;
use crate::context::CallContext;
use crate::error::BoxError;

/// One object write.
#[derive(Debug)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: tokio::fs::File,
}

/// Minimal object-store client surface.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn put_object(&self, request: PutObject) -> Result<(), BoxError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectArchiveConfig {
    pub instance_id: String,
    pub bucket: String,
}

/// Uploads each backup as `{instance_id}/{file name}` in one bucket.
pub struct ObjectArchive<C> {
    config: ObjectArchiveConfig,
    client: C,
    span: Span,
}

impl<C: ObjectClient> ObjectArchive<C> {
    #[must_use]
    pub fn new(config: ObjectArchiveConfig, client: C) -> Self {
        Self {
            config,
            client,
            span: Span::none(),
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Object key for `file`.
    ///
    /// # Errors
    /// Returns an error if the path has no UTF-8 file name.
    pub fn key_for(&self, file: &BackupFile) -> Result<String, BoxError> {
        let base = file
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format!("backup path {} has no file name", file.path().display()))?;
        Ok(format!("{}/{base}", self.config.instance_id))
    }
}

#[async_trait]
impl<C: ObjectClient> ArchiveHandoff for ObjectArchive<C> {
    async fn handoff(&self, ctx: &mut CallContext, file: &mut BackupFile) -> Result<(), BoxError> {
        let key = self.key_for(file)?;
        self.client
            .put_object(PutObject {
                bucket: self.config.bucket.clone(),
                key: key.clone(),
                body: file.async_reader()?,
            })
            .await?;

        let path = std::path::absolute(file.path())?;
        ctx.push_field("archive_key", key.as_str());
        info!(
            parent: &self.span,
            file = %path.display(),
            bucket = %self.config.bucket,
            key = %key,
            ctx = %ctx.render_fields(),
            "Backed up"
        );
        Ok(())
    }
}

impl<C> fmt::Debug for ObjectArchive<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectArchive")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
