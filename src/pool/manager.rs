use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bb8::ManageConnection;
use tokio::sync::Mutex;

use super::blocking::run_blocking;
use crate::config::SqliteTarget;
use crate::engine::{SessionDriver, StorageSession};
use crate::error::SqlLifecycleError;

/// A physical session shared between the pool and the blocking task currently driving it.
pub type SharedSession = Arc<Mutex<Box<dyn StorageSession>>>;

/// bb8 manager that opens sessions through a [`SessionDriver`].
pub struct SessionManager {
    driver: Arc<dyn SessionDriver>,
    target: SqliteTarget,
}

impl SessionManager {
    #[must_use]
    pub fn new(driver: Arc<dyn SessionDriver>, target: SqliteTarget) -> Self {
        Self { driver, target }
    }

    #[must_use]
    pub fn target(&self) -> &SqliteTarget {
        &self.target
    }

    #[must_use]
    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }
}

impl ManageConnection for SessionManager {
    type Connection = SharedSession;
    type Error = SqlLifecycleError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let driver = Arc::clone(&self.driver);
        let target = self.target.clone();
        async move {
            let session = tokio::task::spawn_blocking(move || driver.open(&target))
                .await
                .map_err(|e| {
                    SqlLifecycleError::ExecutionError(format!(
                        "sqlite spawn_blocking join error: {e}"
                    ))
                })??;
            Ok(Arc::new(Mutex::new(session)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let handle = Arc::clone(conn);
        async move { run_blocking(handle, |session| session.ping()).await }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("driver", &self.driver.name())
            .field("target", &self.target)
            .finish()
    }
}
