use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use super::Migration;
use crate::error::SqlLifecycleError;

lazy_static! {
    static ref MIGRATION_FILE_RE: Regex =
        Regex::new(r"^([0-9]+)_(.*)\.(up|down)\.sql$").expect("valid migration file regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub version: u64,
    pub title: String,
    pub direction: Direction,
}

/// Parse `{version}_{title}.{up|down}.sql`.
///
/// Returns `Ok(None)` for names that are not migration scripts.
///
/// # Errors
/// Returns `ConfigError` when the version does not fit in a `u64`.
pub fn parse_file_name(file_name: &str) -> Result<Option<ParsedName>, SqlLifecycleError> {
    let Some(caps) = MIGRATION_FILE_RE.captures(file_name) else {
        return Ok(None);
    };
    let version = caps[1].parse::<u64>().map_err(|e| {
        SqlLifecycleError::ConfigError(format!("migration {file_name}: bad version: {e}"))
    })?;
    let direction = if &caps[3] == "up" {
        Direction::Up
    } else {
        Direction::Down
    };
    Ok(Some(ParsedName {
        version,
        title: caps[2].to_owned(),
        direction,
    }))
}

fn up_migration(file_name: &str, sql: &str) -> Result<Option<Migration>, SqlLifecycleError> {
    Ok(parse_file_name(file_name)?
        .filter(|parsed| parsed.direction == Direction::Up)
        .map(|parsed| Migration::new(parsed.version, parsed.title, sql)))
}

pub(super) fn read_dir(dir: &Path) -> Result<Vec<Migration>, SqlLifecycleError> {
    let io_err = |source| SqlLifecycleError::IoError {
        path: dir.to_path_buf(),
        source,
    };
    let mut migrations = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if parse_file_name(file_name)?.is_none_or(|p| p.direction != Direction::Up) {
            continue;
        }
        let sql = fs::read_to_string(&path).map_err(|source| SqlLifecycleError::IoError {
            path: path.clone(),
            source,
        })?;
        if let Some(migration) = up_migration(file_name, &sql)? {
            migrations.push(migration);
        }
    }
    Ok(migrations)
}

pub(super) fn from_embedded(
    files: &[(&str, &str)],
    sub_path: &str,
) -> Result<Vec<Migration>, SqlLifecycleError> {
    let wanted = Path::new(sub_path.trim_end_matches('/'));
    let mut migrations = Vec::new();
    for (path, sql) in files {
        let path = Path::new(path);
        if path.parent() != Some(wanted) {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(migration) = up_migration(file_name, sql)? {
            migrations.push(migration);
        }
    }
    Ok(migrations)
}
