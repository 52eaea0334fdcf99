// Storage engine seam.
//
// - driver: the default rusqlite-backed driver and session
// - params: parameter conversion between `RowValues` and SQLite values
// - query: result extraction and building

pub mod driver;
pub mod params;
pub mod query;

use std::path::PathBuf;

use crate::config::SqliteTarget;
use crate::error::SqlLifecycleError;
use crate::results::ResultSet;
use crate::types::RowValues;

pub use driver::{RusqliteDriver, RusqliteSession};
pub use params::Params;
pub use query::build_result_set;

/// One physical session against the storage engine.
///
/// Everything but [`native_handle`](StorageSession::native_handle) is the generic SQL surface.
/// The native handle is an optional capability: hot backup needs the engine's own connection
/// type, and a session that cannot hand one out makes backup fail with
/// [`SqlLifecycleError::NativeHandleError`] instead of a failed downcast.
pub trait StorageSession: Send {
    /// Execute one or more `;`-separated statements.
    ///
    /// # Errors
    /// Returns `SqlLifecycleError` if any statement fails.
    fn execute_batch(&mut self, sql: &str) -> Result<(), SqlLifecycleError>;

    /// Execute a single statement and return rows affected.
    ///
    /// # Errors
    /// Returns `SqlLifecycleError` if preparation or execution fails.
    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, SqlLifecycleError>;

    /// Run a query and materialize every row.
    ///
    /// # Errors
    /// Returns `SqlLifecycleError` if preparation, execution or value extraction fails.
    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlLifecycleError>;

    /// Connectivity probe.
    ///
    /// # Errors
    /// Returns `SqlLifecycleError` if the engine does not answer.
    fn ping(&mut self) -> Result<(), SqlLifecycleError> {
        self.query("SELECT 1", &[]).map(|_| ())
    }

    /// File backing the `main` schema, or `None` for in-memory and temporary databases.
    fn path(&mut self) -> Option<PathBuf>;

    fn native_handle(&mut self) -> Option<&mut rusqlite::Connection> {
        None
    }
}

/// Opens physical sessions for a target.
///
/// The target arrives with its path and options still separate; the connection string is
/// only ever used for display.
pub trait SessionDriver: Send + Sync + 'static {
    /// Short name used in logs and in `NativeHandleError`.
    fn name(&self) -> &'static str;

    /// Open a new physical session.
    ///
    /// # Errors
    /// Returns `SqlLifecycleError` if the engine refuses the target.
    fn open(&self, target: &SqliteTarget) -> Result<Box<dyn StorageSession>, SqlLifecycleError>;
}
