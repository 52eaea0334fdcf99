mod common;

use sqlite_lifecycle::prelude::*;

const EMBEDDED: &[(&str, &str)] = &[
    (
        "testmigrations/0001_create_t.up.sql",
        include_str!("testmigrations/0001_create_t.up.sql"),
    ),
    (
        "testmigrations/0001_create_t.down.sql",
        include_str!("testmigrations/0001_create_t.down.sql"),
    ),
    (
        "testmigrations/0002_add_notes.up.sql",
        include_str!("testmigrations/0002_add_notes.up.sql"),
    ),
];

#[tokio::test]
async fn test03_applying_twice_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    common::init_tracing();
    let tmp = tempfile::tempdir()?;
    let db = SqliteConfig::builder(SqliteTarget::file(tmp.path(), "app.db"))
        .migrations(common::fixture_migrations()?)
        .open()
        .await?;

    let first = db.migrate().await?;
    assert_eq!(first, MigrationOutcome::Applied { count: 2, latest: 2 });
    let after_first = std::fs::read(tmp.path().join("app.db"))?;

    let second = db.migrate().await?;
    assert_eq!(second, MigrationOutcome::NoChange);
    assert_eq!(second.applied_count(), 0);
    let after_second = std::fs::read(tmp.path().join("app.db"))?;
    assert_eq!(after_first, after_second);

    let rs = db
        .query("SELECT text FROM t WHERE id = ?1", &[RowValues::Int(1)])
        .await?;
    assert_eq!(rs.results[0].get("text").and_then(RowValues::as_text), Some("hello world"));
    Ok(())
}

#[tokio::test]
async fn test03_embedded_and_directory_sources_agree() -> Result<(), Box<dyn std::error::Error>> {
    let embedded = MigrationSet::from_embedded(EMBEDDED, "testmigrations")?;
    let from_dir = common::fixture_migrations()?;
    assert_eq!(embedded, from_dir);
    assert_eq!(embedded.len(), 2);

    let db = SqliteConfig::builder(SqliteTarget::InMemory).open().await?;
    assert_eq!(db.apply_migrations(&embedded).await?.applied_count(), 2);
    let versions: Vec<u64> = db.applied_versions().await?.into_iter().collect();
    assert_eq!(versions, vec![1, 2]);
    Ok(())
}

#[tokio::test]
async fn test03_new_versions_apply_on_top() -> Result<(), Box<dyn std::error::Error>> {
    let db = SqliteConfig::builder(SqliteTarget::InMemory).open().await?;
    let base = common::fixture_migrations()?;
    db.apply_migrations(&base).await?;

    let mut extended: Vec<Migration> = base.iter().cloned().collect();
    extended.push(Migration::new(
        3,
        "seed_notes",
        "INSERT INTO notes (t_id, body) VALUES (1, 'first');",
    ));
    let outcome = db.apply_migrations(&MigrationSet::new(extended)?).await?;
    assert_eq!(outcome, MigrationOutcome::Applied { count: 1, latest: 3 });

    let rs = db.query("SELECT COUNT(*) AS n FROM notes", &[]).await?;
    assert_eq!(rs.results[0].get("n"), Some(&RowValues::Int(1)));
    Ok(())
}

#[tokio::test]
async fn test03_failure_keeps_earlier_versions() -> Result<(), Box<dyn std::error::Error>> {
    let db = SqliteConfig::builder(SqliteTarget::InMemory).open().await?;
    let set = MigrationSet::new(vec![
        Migration::new(1, "create_t", "CREATE TABLE t (id INTEGER, text TEXT);"),
        Migration::new(2, "broken", "INSERT INTO no_such_table VALUES (1);"),
        Migration::new(3, "never", "CREATE TABLE never (id INTEGER);"),
    ])?;

    let err = db.apply_migrations(&set).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Migration);
    assert!(!err.is_retryable());
    match err.root() {
        SqlLifecycleError::MigrationError { version, name, .. } => {
            assert_eq!(*version, 2);
            assert_eq!(name, "broken");
        }
        other => panic!("unexpected error: {other}"),
    }

    let versions: Vec<u64> = db.applied_versions().await?.into_iter().collect();
    assert_eq!(versions, vec![1]);
    let never = db
        .query("SELECT name FROM sqlite_master WHERE name = 'never'", &[])
        .await?;
    assert!(never.results.is_empty());
    Ok(())
}

#[tokio::test]
async fn test03_migrate_without_a_set_is_a_config_error() -> Result<(), Box<dyn std::error::Error>>
{
    let db = SqliteConfig::builder(SqliteTarget::InMemory).open().await?;
    let err = db.migrate().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    Ok(())
}
