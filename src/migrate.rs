// Versioned schema migrations.
//
// - source: loading ordered `{version}_{title}.up.sql` scripts from disk or embedded files
// - runner: applying unapplied versions with bookkeeping kept inside the database

pub mod runner;
pub mod source;

pub use runner::{
    BOOKKEEPING_TABLE, MigrationOutcome, applied_versions, apply, ensure_bookkeeping_table,
};
pub use source::{Direction, ParsedName, parse_file_name};

use std::path::Path;

use crate::error::SqlLifecycleError;

/// One versioned schema-change script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: u64,
    pub name: String,
    pub sql: String,
}

impl Migration {
    #[must_use]
    pub fn new(version: u64, name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Scripts ordered by strictly increasing version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSet {
    migrations: Vec<Migration>,
}

impl MigrationSet {
    /// Order `migrations` by version.
    ///
    /// # Errors
    /// Returns `ConfigError` if two scripts share a version.
    pub fn new(mut migrations: Vec<Migration>) -> Result<Self, SqlLifecycleError> {
        migrations.sort_by_key(|m| m.version);
        if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(SqlLifecycleError::ConfigError(format!(
                "duplicate migration version {}: {} and {}",
                pair[0].version, pair[0].name, pair[1].name
            )));
        }
        Ok(Self { migrations })
    }

    /// Load the `up` scripts found directly in `root/sub_path`.
    ///
    /// # Errors
    /// Returns `IoError` if the directory or a script cannot be read, and `ConfigError` for
    /// duplicate or out-of-range versions.
    pub fn from_dir(root: impl AsRef<Path>, sub_path: &str) -> Result<Self, SqlLifecycleError> {
        Self::new(source::read_dir(&root.as_ref().join(sub_path))?)
    }

    /// Load the `up` scripts among `files` whose parent directory is `sub_path`.
    ///
    /// `files` pairs a relative path with the script text, typically built with `include_str!`.
    ///
    /// # Errors
    /// Returns `ConfigError` for duplicate or out-of-range versions.
    pub fn from_embedded(files: &[(&str, &str)], sub_path: &str) -> Result<Self, SqlLifecycleError> {
        Self::new(source::from_embedded(files, sub_path)?)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.iter()
    }

    #[must_use]
    pub fn latest_version(&self) -> Option<u64> {
        self.migrations.last().map(|m| m.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_orders_by_version() -> Result<(), SqlLifecycleError> {
        let set = MigrationSet::new(vec![
            Migration::new(3, "three", "SELECT 3;"),
            Migration::new(1, "one", "SELECT 1;"),
        ])?;
        let versions: Vec<u64> = set.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 3]);
        assert_eq!(set.latest_version(), Some(3));
        Ok(())
    }

    #[test]
    fn duplicate_versions_are_rejected() {
        let err = MigrationSet::new(vec![
            Migration::new(1, "a", "SELECT 1;"),
            Migration::new(1, "b", "SELECT 1;"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate migration version 1"));
    }
}
