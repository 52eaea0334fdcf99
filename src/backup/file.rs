use std::fs::File;
use std::io::Seek;
use std::path::{Path, PathBuf};

use crate::error::SqlLifecycleError;

/// A finished backup, opened for reading and positioned at the start.
#[derive(Debug)]
pub struct BackupFile {
    file: File,
    path: PathBuf,
}

impl BackupFile {
    /// # Errors
    /// Returns `IoError` if `path` cannot be opened for reading.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SqlLifecycleError> {
        let path = path.into();
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|source| SqlLifecycleError::IoError {
                path: path.clone(),
                source,
            })?
            .into_std()
            .await;
        Ok(Self { file, path })
    }

    /// Path resolved from the destination session after the copy.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    #[must_use]
    pub fn into_file(self) -> File {
        self.file
    }

    /// # Errors
    /// Returns `IoError` if the seek fails.
    pub fn rewind(&mut self) -> Result<(), SqlLifecycleError> {
        self.file.rewind().map_err(|source| self.io_error(source))
    }

    /// # Errors
    /// Returns `IoError` if metadata cannot be read.
    pub fn len(&self) -> Result<u64, SqlLifecycleError> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|source| self.io_error(source))
    }

    /// An async reader sharing this handle's cursor.
    ///
    /// # Errors
    /// Returns `IoError` if the handle cannot be duplicated.
    pub fn async_reader(&self) -> Result<tokio::fs::File, SqlLifecycleError> {
        self.file
            .try_clone()
            .map(tokio::fs::File::from_std)
            .map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> SqlLifecycleError {
        SqlLifecycleError::IoError {
            path: self.path.clone(),
            source,
        }
    }
}
