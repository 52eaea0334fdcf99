use crate::engine::StorageSession;
use crate::error::SqlLifecycleError;

use super::manager::SharedSession;

fn join_error(e: &tokio::task::JoinError) -> SqlLifecycleError {
    SqlLifecycleError::ExecutionError(format!("sqlite spawn_blocking join error: {e}"))
}

/// Run synchronous engine work against one session on the blocking pool.
///
/// # Errors
/// Returns whatever `func` returns, or `ExecutionError` if the blocking task panicked.
pub async fn run_blocking<F, R>(session: SharedSession, func: F) -> Result<R, SqlLifecycleError>
where
    F: FnOnce(&mut dyn StorageSession) -> Result<R, SqlLifecycleError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = session.blocking_lock();
        func(&mut **guard)
    })
    .await
    .map_err(|e| join_error(&e))?
}

/// Run synchronous engine work that needs two distinct sessions at once.
///
/// Both locks are held for the whole closure. The sessions must not be the same physical
/// session, or the second lock would wait forever.
///
/// # Errors
/// Returns whatever `func` returns, or `ExecutionError` if the blocking task panicked.
pub async fn run_blocking_pair<F, R>(
    source: SharedSession,
    destination: SharedSession,
    func: F,
) -> Result<R, SqlLifecycleError>
where
    F: FnOnce(&mut dyn StorageSession, &mut dyn StorageSession) -> Result<R, SqlLifecycleError>
        + Send
        + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut src = source.blocking_lock();
        let mut dst = destination.blocking_lock();
        func(&mut **src, &mut **dst)
    })
    .await
    .map_err(|e| join_error(&e))?
}
