// Session pool.
//
// - manager: bb8 manager that opens sessions through a `SessionDriver`
// - blocking: helpers that run synchronous engine work on the blocking pool

pub mod blocking;
pub mod manager;

use std::time::Duration;

use bb8::Pool;

pub use blocking::{run_blocking, run_blocking_pair};
pub use manager::{SessionManager, SharedSession};

use crate::error::SqlLifecycleError;

/// Pool of physical sessions against one connection string.
pub type SessionPool = Pool<SessionManager>;

/// A logical session: a checkout that returns its physical session to the pool on drop.
pub type PooledSession = bb8::PooledConnection<'static, SessionManager>;

/// Physical session cap. Native backup needs uncontended access to the session it reads from.
pub const MAX_PHYSICAL_SESSIONS: u32 = 1;

/// Build a single-session pool and eagerly open its session.
///
/// The session is never reaped for idleness or age, so an in-memory database lives as long as
/// the pool does.
///
/// # Errors
/// Returns `SqlLifecycleError::ConnectError` if the first session cannot be opened.
pub async fn build_pool(
    manager: SessionManager,
    connection_timeout: Duration,
) -> Result<SessionPool, SqlLifecycleError> {
    let target = manager.target().connection_string();
    Pool::builder()
        .max_size(MAX_PHYSICAL_SESSIONS)
        .min_idle(Some(MAX_PHYSICAL_SESSIONS))
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connection_timeout(connection_timeout)
        .retry_connection(false)
        .build(manager)
        .await
        .map_err(|e| SqlLifecycleError::ConnectError {
            target,
            source: Box::new(e),
        })
}

/// Check out the pool's session.
///
/// # Errors
/// Returns `SqlLifecycleError::ConnectionError` if the checkout times out, or the manager's
/// error if the session had to be reopened and that failed.
pub async fn checkout(pool: &SessionPool) -> Result<PooledSession, SqlLifecycleError> {
    pool.get_owned().await.map_err(SqlLifecycleError::from)
}
