use std::collections::BTreeSet;

use chrono::{SecondsFormat, Utc};
use tracing::{Span, debug, info};

use super::{Migration, MigrationSet};
use crate::engine::StorageSession;
use crate::error::SqlLifecycleError;
use crate::types::RowValues;

/// Name of the table recording applied versions.
pub const BOOKKEEPING_TABLE: &str = "schema_migrations";

const CREATE_BOOKKEEPING_SQL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
)";

const BOOKKEEPING_EXISTS_SQL: &str =
    "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'";

const SELECT_APPLIED_SQL: &str = "SELECT version FROM schema_migrations ORDER BY version";

const RECORD_APPLIED_SQL: &str =
    "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)";

/// Result of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Every version in the set was already applied.
    NoChange,
    Applied { count: usize, latest: u64 },
}

impl MigrationOutcome {
    #[must_use]
    pub fn applied_count(&self) -> usize {
        match self {
            MigrationOutcome::NoChange => 0,
            MigrationOutcome::Applied { count, .. } => *count,
        }
    }
}

/// Create the bookkeeping table if it does not exist yet.
///
/// # Errors
/// Returns `SqlLifecycleError` if the DDL fails.
pub fn ensure_bookkeeping_table(session: &mut dyn StorageSession) -> Result<(), SqlLifecycleError> {
    session.execute_batch(CREATE_BOOKKEEPING_SQL)
}

/// Versions recorded as applied. A database that never ran migrations reports none, and is
/// not written to.
///
/// # Errors
/// Returns `SqlLifecycleError` if the bookkeeping table cannot be read.
pub fn applied_versions(
    session: &mut dyn StorageSession,
) -> Result<BTreeSet<u64>, SqlLifecycleError> {
    let exists = session.query(BOOKKEEPING_EXISTS_SQL, &[])?;
    let present = exists
        .results
        .first()
        .and_then(|row| row.get("n"))
        .and_then(RowValues::as_int)
        .is_some_and(|n| *n > 0);
    if !present {
        return Ok(BTreeSet::new());
    }

    let rows = session.query(SELECT_APPLIED_SQL, &[])?;
    rows.results
        .iter()
        .map(|row| match row.get("version") {
            Some(RowValues::Int(v)) => u64::try_from(*v).map_err(|_| {
                SqlLifecycleError::ExecutionError(format!(
                    "{BOOKKEEPING_TABLE} holds a negative version: {v}"
                ))
            }),
            other => Err(SqlLifecycleError::ExecutionError(format!(
                "{BOOKKEEPING_TABLE} holds a non-integer version: {other:?}"
            ))),
        })
        .collect()
}

/// Apply every migration in `set` that is not yet recorded, in version order.
///
/// Each version runs in its own transaction together with its bookkeeping row, so a failing
/// script leaves earlier versions applied and nothing of itself behind.
///
/// # Errors
/// Returns `MigrationError` naming the first version that failed.
pub fn apply(
    session: &mut dyn StorageSession,
    set: &MigrationSet,
    span: &Span,
) -> Result<MigrationOutcome, SqlLifecycleError> {
    ensure_bookkeeping_table(session)?;
    let applied = applied_versions(session)?;

    let mut count = 0;
    let mut latest = None;
    for migration in set.iter().filter(|m| !applied.contains(&m.version)) {
        apply_one(session, migration, span)?;
        count += 1;
        latest = Some(migration.version);
    }

    match latest {
        None => {
            info!(parent: span, "No new migrations.");
            Ok(MigrationOutcome::NoChange)
        }
        Some(latest) => {
            info!(parent: span, count, latest, "Migrations applied.");
            Ok(MigrationOutcome::Applied { count, latest })
        }
    }
}

fn apply_one(
    session: &mut dyn StorageSession,
    migration: &Migration,
    span: &Span,
) -> Result<(), SqlLifecycleError> {
    let failed = |source: SqlLifecycleError| SqlLifecycleError::MigrationError {
        version: migration.version,
        name: migration.name.clone(),
        source: Box::new(source),
    };

    let version = i64::try_from(migration.version).map_err(|_| {
        failed(SqlLifecycleError::ConfigError(format!(
            "version {} does not fit in an INTEGER column",
            migration.version
        )))
    })?;

    debug!(parent: span, version = migration.version, name = %migration.name, "Applying migration");
    session.execute_batch("BEGIN").map_err(failed)?;

    let result = session.execute_batch(&migration.sql).and_then(|()| {
        session.execute(
            RECORD_APPLIED_SQL,
            &[
                RowValues::Int(version),
                RowValues::Text(migration.name.clone()),
                RowValues::Text(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            ],
        )?;
        session.execute_batch("COMMIT")
    });

    if let Err(err) = result {
        // the script may have ended the transaction itself
        if let Err(rollback_err) = session.execute_batch("ROLLBACK") {
            debug!(parent: span, error = %rollback_err, "Rollback after failed migration");
        }
        return Err(failed(err));
    }

    info!(parent: span, version = migration.version, name = %migration.name, "Applied migration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SqliteTarget;
    use crate::engine::RusqliteSession;
    use crate::error::ErrorKind;

    fn set() -> MigrationSet {
        MigrationSet::new(vec![
            Migration::new(
                1,
                "create_t",
                "CREATE TABLE t (id INTEGER, text TEXT); INSERT INTO t VALUES (1, 'hello world');",
            ),
            Migration::new(2, "add_index", "CREATE INDEX t_id ON t (id);"),
        ])
        .expect("valid set")
    }

    #[test]
    fn applies_once_then_reports_no_change() -> Result<(), SqlLifecycleError> {
        let mut session = RusqliteSession::open(&SqliteTarget::InMemory)?;
        let span = Span::none();

        let first = apply(&mut session, &set(), &span)?;
        assert_eq!(first, MigrationOutcome::Applied { count: 2, latest: 2 });

        let second = apply(&mut session, &set(), &span)?;
        assert_eq!(second, MigrationOutcome::NoChange);
        assert_eq!(second.applied_count(), 0);

        let versions = applied_versions(&mut session)?;
        assert_eq!(versions.into_iter().collect::<Vec<_>>(), vec![1, 2]);
        Ok(())
    }

    #[test]
    fn fresh_database_has_no_applied_versions() -> Result<(), SqlLifecycleError> {
        let mut session = RusqliteSession::open(&SqliteTarget::InMemory)?;
        assert!(applied_versions(&mut session)?.is_empty());
        let tables = session.query(
            "SELECT name FROM sqlite_master WHERE name = 'schema_migrations'",
            &[],
        )?;
        assert!(tables.results.is_empty());
        Ok(())
    }

    #[test]
    fn failing_version_rolls_back_alone() -> Result<(), SqlLifecycleError> {
        let mut session = RusqliteSession::open(&SqliteTarget::InMemory)?;
        let broken = MigrationSet::new(vec![
            Migration::new(1, "create_t", "CREATE TABLE t (id INTEGER);"),
            Migration::new(
                2,
                "broken",
                "CREATE TABLE half (id INTEGER); INSERT INTO missing VALUES (1);",
            ),
        ])?;

        let err = apply(&mut session, &broken, &Span::none()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Migration);
        match err {
            SqlLifecycleError::MigrationError { version, name, .. } => {
                assert_eq!(version, 2);
                assert_eq!(name, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(
            applied_versions(&mut session)?.into_iter().collect::<Vec<_>>(),
            vec![1]
        );
        let half = session.query(
            "SELECT name FROM sqlite_master WHERE name = 'half'",
            &[],
        )?;
        assert!(half.results.is_empty());
        Ok(())
    }
}
