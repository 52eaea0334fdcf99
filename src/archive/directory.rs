use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::object::{ObjectClient, PutObject};
use crate::error::BoxError;

/// Stores objects as files under `root/bucket/key`.
#[derive(Debug, Clone)]
pub struct DirectoryObjectClient {
    root: PathBuf,
}

impl DirectoryObjectClient {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where `bucket`/`key` is stored. Keys may not climb out of the bucket.
    ///
    /// # Errors
    /// Returns an error for absolute keys or keys containing `..`.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, BoxError> {
        let relative = Path::new(key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
            || Path::new(bucket)
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(format!("invalid object location {bucket}/{key}").into());
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

#[async_trait]
impl ObjectClient for DirectoryObjectClient {
    async fn put_object(&self, mut request: PutObject) -> Result<(), BoxError> {
        let dest = self.object_path(&request.bucket, &request.key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut out = tokio::fs::File::create(&dest).await?;
        tokio::io::copy(&mut request.body, &mut out).await?;
        out.flush().await?;
        out.sync_all().await?;
        Ok(())
    }
}
