mod common;

use std::path::Path;
use std::sync::Arc;

use sqlite_lifecycle::prelude::*;

#[tokio::test]
async fn test02_in_memory_open_never_creates_a_directory() -> Result<(), Box<dyn std::error::Error>>
{
    common::init_tracing();
    let db = SqliteConfig::builder(SqliteTarget::InMemory).open().await?;

    assert!(!db.is_closed());
    assert_eq!(db.connection_string(), IN_MEMORY);
    assert!(!Path::new(IN_MEMORY).exists());

    let rs = db.query("SELECT 1 AS one", &[]).await?;
    assert_eq!(rs.results[0].get("one"), Some(&RowValues::Int(1)));
    Ok(())
}

#[tokio::test]
async fn test02_missing_directories_are_created() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("a").join("b").join("c");
    assert!(!dir.exists());

    let db = SqliteConfig::builder(SqliteTarget::file(&dir, "app.db"))
        .open()
        .await?;
    assert!(dir.is_dir());
    assert!(db.connection_string().ends_with("app.db?"));

    db.execute_batch("CREATE TABLE t (id INTEGER);").await?;
    assert!(dir.join("app.db").is_file());
    Ok(())
}

#[tokio::test]
async fn test02_options_are_passed_to_the_engine() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    let target = SqliteTarget::file(tmp.path(), "opts.db").with_options("cache=private");
    let db = SqliteConfig::builder(target).open().await?;

    db.execute("CREATE TABLE t (id INTEGER)", &[]).await?;
    let inserted = db
        .execute("INSERT INTO t (id) VALUES (?1), (?2)", &[RowValues::Int(1), RowValues::Int(2)])
        .await?;
    assert_eq!(inserted, 2);
    assert!(tmp.path().join("opts.db").is_file());
    Ok(())
}

#[tokio::test]
async fn test02_close_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = SqliteConfig::builder(SqliteTarget::InMemory).open().await?;
    db.close();
    db.close();
    assert!(db.is_closed());

    let err = db.query("SELECT 1", &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Closed);
    Ok(())
}

#[tokio::test]
async fn test02_unusable_directory_is_a_directory_error() -> Result<(), Box<dyn std::error::Error>>
{
    let tmp = tempfile::tempdir()?;
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, b"not a directory")?;

    let err = SqliteConfig::builder(SqliteTarget::file(blocker.join("sub"), "app.db"))
        .open()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Directory);
    assert!(!err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn test02_refused_session_is_a_connect_error() -> Result<(), Box<dyn std::error::Error>> {
    let err = SqliteConfig::builder(SqliteTarget::InMemory)
        .driver(Arc::new(common::RefusingDriver))
        .open()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connect);
    assert!(err.to_string().contains(":memory:"));
    Ok(())
}
